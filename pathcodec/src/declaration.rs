//! Declarations: the planner's input.

use crate::decode::DecodePlanner;
use crate::dependency::DependencyGraph;
use crate::encode::EncodePlanner;
use crate::error::PlanError;
use crate::field::{BindingGroup, FieldDescriptor};
use crate::key::{ContainerNamer, KeyNameAllocator};
use crate::options::PlannerOptions;
use crate::plan::{EnumPlan, Plan, StructPlan};
use crate::tagging::{CaseDescriptor, TaggingRequest, plan_enum};
use crate::trie::PathTrie;
use crate::debug;

/// A struct: named fields coded into one keyed container.
///
/// # Example
///
/// ```
/// use pathcodec::{FieldDescriptor, PlannerOptions, StructDeclaration, TypeDescriptor};
///
/// let plan = StructDeclaration::new("Point")
///     .with_field(FieldDescriptor::new("x", TypeDescriptor::integer()))
///     .with_field(FieldDescriptor::new("y", TypeDescriptor::integer()).coded_at(["pos", "y"]))
///     .plan(&PlannerOptions::default())
///     .unwrap();
/// assert_eq!(plan.keys.len(), 3);
/// assert_eq!(plan.decode.required, ["x", "y"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDeclaration {
    /// Declared type name
    pub name: String,
    /// Fields in declaration order
    pub fields: Vec<FieldDescriptor>,
}

impl StructDeclaration {
    /// A struct without fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field.
    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Add several fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDescriptor>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Add every binding of a multi-binding declaration.
    pub fn with_group(mut self, group: &BindingGroup) -> Result<Self, PlanError> {
        self.fields.extend(group.expand()?);
        Ok(self)
    }

    /// Plan decoding and encoding of this struct.
    pub fn plan(&self, options: &PlannerOptions) -> Result<StructPlan, PlanError> {
        debug!(name = %self.name, fields = self.fields.len(), "planning struct");
        check_unique_names(&self.fields)?;
        let graph = DependencyGraph::build(&self.fields)?;

        let mut keys = KeyNameAllocator::new(options);
        let trie = PathTrie::build(self.fields.iter().cloned(), &mut keys)?;

        let mut names = ContainerNamer::new(options);
        let decode = DecodePlanner::new(&trie, &graph, &mut keys, &mut names)
            .plan(&options.root_container, false)?;

        let mut names = ContainerNamer::new(options);
        let encode =
            EncodePlanner::new(&trie, &mut keys, &mut names).plan(&options.root_container, false);

        Ok(StructPlan {
            name: self.name.clone(),
            keys: keys.used_keys(),
            decode,
            encode,
        })
    }
}

/// An enum: cases with associated fields, wrapped by a discriminant strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDeclaration {
    /// Declared type name
    pub name: String,
    /// Tagging customizations, in declaration order
    pub tagging: Vec<TaggingRequest>,
    /// Cases in declaration order
    pub cases: Vec<CaseDescriptor>,
    /// Case decoded when the discriminant matches no case
    pub unknown_case: Option<String>,
}

impl EnumDeclaration {
    /// An externally tagged enum without cases.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tagging: Vec::new(),
            cases: Vec::new(),
            unknown_case: None,
        }
    }

    /// Add a tagging customization.
    pub fn tagged(mut self, request: TaggingRequest) -> Self {
        self.tagging.push(request);
        self
    }

    /// Add a case.
    pub fn with_case(mut self, case: CaseDescriptor) -> Self {
        self.cases.push(case);
        self
    }

    /// Decode unmatched discriminants as the named field-less case.
    pub fn with_unknown_case(mut self, name: impl Into<String>) -> Self {
        self.unknown_case = Some(name.into());
        self
    }

    /// Plan decoding and encoding of every case.
    pub fn plan(&self, options: &PlannerOptions) -> Result<EnumPlan, PlanError> {
        plan_enum(self, options)
    }
}

/// Any declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    /// A struct
    Struct(StructDeclaration),
    /// An enum
    Enum(EnumDeclaration),
}

impl Declaration {
    /// Declared type name.
    pub fn name(&self) -> &str {
        match self {
            Declaration::Struct(decl) => &decl.name,
            Declaration::Enum(decl) => &decl.name,
        }
    }

    /// Plan this declaration.
    pub fn plan(&self, options: &PlannerOptions) -> Result<Plan, PlanError> {
        match self {
            Declaration::Struct(decl) => decl.plan(options).map(Plan::Struct),
            Declaration::Enum(decl) => decl.plan(options).map(Plan::Enum),
        }
    }
}

impl From<StructDeclaration> for Declaration {
    fn from(decl: StructDeclaration) -> Self {
        Declaration::Struct(decl)
    }
}

impl From<EnumDeclaration> for Declaration {
    fn from(decl: EnumDeclaration) -> Self {
        Declaration::Enum(decl)
    }
}

/// Plan many declarations independently.
///
/// Results come back in input order; an error only affects its own
/// declaration. With the `rayon` feature, declarations are planned in
/// parallel.
pub fn plan_all(
    declarations: &[Declaration],
    options: &PlannerOptions,
) -> Vec<Result<Plan, PlanError>> {
    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        declarations
            .par_iter()
            .map(|decl| decl.plan(options))
            .collect()
    }
    #[cfg(not(feature = "rayon"))]
    {
        declarations.iter().map(|decl| decl.plan(options)).collect()
    }
}

pub(crate) fn check_unique_names(fields: &[FieldDescriptor]) -> Result<(), PlanError> {
    for (index, field) in fields.iter().enumerate() {
        if fields[..index].iter().any(|earlier| earlier.name == field.name) {
            return Err(PlanError::DuplicateField {
                name: field.name.clone(),
            });
        }
    }
    Ok(())
}
