//! The codec plan: pure data handed to an emitter.
//!
//! A plan never holds callbacks. Converters, predicates and default values
//! are referenced by name or source text, so an emitter can target any
//! output syntax, and the whole plan can be persisted with `serde`.
//!
//! Every container level is split into segments that an emitter writes in
//! this order:
//!
//! 1. `setup`: nested containers acquired unconditionally (hoisted)
//! 2. `statements`: values read or written directly in this container
//! 3. `branches`: one block per nested container, fallback-guarded on decode
//! 4. `deferred`: reads postponed until their dependencies were decoded in
//!    nested containers (decode only)

use serde::{Deserialize, Serialize};

use crate::fallback::FallbackPolicy;
use crate::field::{ConverterRef, DefaultExpr, Predicate, TypeDescriptor};
use crate::key::KeyRef;
use crate::tagging::{InternalContent, TagKind, TagValue};

/// A structural failure raised by generated code at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Failure {
    /// No discriminant could be found
    MissingDiscriminant,
    /// More than one candidate discriminant was present
    AmbiguousDiscriminant,
    /// The discriminant matched no case
    UnknownDiscriminant,
    /// No untagged case decoded successfully
    NoCaseMatched,
    /// A user-supplied failure message
    Custom(String),
}

/// Read one field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecode {
    /// Field receiving the value
    pub field: String,
    /// Container binding to read from
    pub container: String,
    /// Key to read; `None` decodes the container's coder itself
    pub key: Option<KeyRef>,
    /// Expected type
    pub ty: TypeDescriptor,
    /// Custom converter, if any
    pub converter: Option<ConverterRef>,
    /// What to do when the key is missing or its value invalid
    pub fallback: FallbackPolicy,
}

/// Write one field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEncode {
    /// Field providing the value
    pub field: String,
    /// Container binding to write into
    pub container: String,
    /// Key to write; `None` encodes into the container's coder itself
    pub key: Option<KeyRef>,
    /// Declared type
    pub ty: TypeDescriptor,
    /// Custom converter, if any
    pub converter: Option<ConverterRef>,
}

/// Write an enum case's discriminant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagWrite {
    /// Container binding to write into
    pub container: String,
    /// Key of the discriminant
    pub key: KeyRef,
    /// Value written
    pub value: TagValue,
}

/// One step of generated code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statement {
    /// Read a field value
    Decode(FieldDecode),
    /// Write a field value
    Encode(FieldEncode),
    /// Write the discriminant of the case being encoded
    EncodeTag(TagWrite),
    /// Give a field its default value
    AssignDefault {
        /// Field receiving the value
        field: String,
        /// Default expression
        value: DefaultExpr,
    },
    /// Give an optional field no value
    AssignNone {
        /// Field receiving the value
        field: String,
    },
    /// Branch on a named condition
    Conditional {
        /// The condition
        predicate: Predicate,
        /// Run when the condition holds
        then: Vec<Statement>,
        /// Run otherwise
        otherwise: Vec<Statement>,
    },
    /// Fail with a structural error
    Throw(Failure),
    /// Stop decoding; every remaining field keeps what it has
    Return,
}

impl Statement {
    /// Whether nothing after this statement can run.
    pub fn is_terminal(&self) -> bool {
        match self {
            Statement::Throw(_) | Statement::Return => true,
            Statement::Conditional {
                then, otherwise, ..
            } => then.iter().any(Statement::is_terminal) && otherwise.iter().any(Statement::is_terminal),
            _ => false,
        }
    }
}

/// Unconditional acquisition of a nested keyed container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acquisition {
    /// Binding for the new container
    pub container: String,
    /// Binding of the container holding it
    pub parent: String,
    /// Key of the nested container
    pub key: KeyRef,
}

/// Decode plan for one container level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeContainer {
    /// Binding of this container
    pub container: String,
    /// Hoisted acquisitions of nested containers
    pub setup: Vec<Acquisition>,
    /// Reads from this container
    pub statements: Vec<Statement>,
    /// Blocks for nested containers
    pub branches: Vec<DecodeBranch>,
    /// Reads that had to wait for nested containers
    pub deferred: Vec<Statement>,
}

impl DecodeContainer {
    pub(crate) fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            ..Self::default()
        }
    }

    /// Number of container acquisitions in this level and below.
    pub fn acquisition_count(&self) -> usize {
        self.setup.len()
            + self
                .branches
                .iter()
                .map(|branch| {
                    let own = usize::from(branch.acquisition == BranchAcquisition::Guarded);
                    own + branch.body.acquisition_count()
                })
                .sum::<usize>()
    }

    /// Whether nothing is read at this level or below.
    pub fn is_empty(&self) -> bool {
        self.setup.is_empty()
            && self.statements.is_empty()
            && self.branches.is_empty()
            && self.deferred.is_empty()
    }
}

/// How a decode branch obtains its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchAcquisition {
    /// Acquired in the parent's setup
    Hoisted,
    /// Acquired by the branch itself, under its fallback policy
    Guarded,
    /// Already bound by an earlier read of the same path
    Reused,
}

/// Decoding of one nested container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeBranch {
    /// Binding of the nested container
    pub container: String,
    /// Binding of the parent container
    pub parent: String,
    /// Key of the nested container
    pub key: KeyRef,
    /// How the container is obtained
    pub acquisition: BranchAcquisition,
    /// What happens if the container cannot be obtained
    pub fallback: FallbackPolicy,
    /// Plan of the nested level
    pub body: DecodeContainer,
}

/// How a decode plan gets its top-level keyed container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecodeRoot {
    /// Acquire it from the decoder
    Acquire,
    /// It is already bound (an enum tag was read from it)
    Shared,
    /// Nothing is read by key at the top level
    Skip,
}

/// Complete decode plan for a struct or one enum case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodePlan {
    /// Values assigned before anything is read (fields that are not decoded)
    pub initializers: Vec<Statement>,
    /// How the top-level container is obtained
    pub root: DecodeRoot,
    /// The top-level container plan
    pub body: DecodeContainer,
    /// Fields that must hold a value once decoding ends
    pub required: Vec<String>,
}

/// Mutability of an encode container binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutability {
    /// Every write below is unconditional: create the container once, eagerly
    Immutable,
    /// Some writes are conditional: create the container on the first write
    Mutable,
}

/// Encode plan for one container level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeContainer {
    /// Binding of this container
    pub container: String,
    /// Writes into this container
    pub statements: Vec<Statement>,
    /// Blocks for nested containers
    pub branches: Vec<EncodeBranch>,
}

impl EncodeContainer {
    pub(crate) fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            ..Self::default()
        }
    }

    /// Number of nested containers created at this level and below.
    pub fn container_count(&self) -> usize {
        self.branches
            .iter()
            .map(|branch| 1 + branch.body.container_count())
            .sum()
    }
}

/// Encoding of one nested container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeBranch {
    /// Binding of the nested container
    pub container: String,
    /// Binding of the parent container
    pub parent: String,
    /// Key of the nested container
    pub key: KeyRef,
    /// How the binding is declared
    pub mutability: Mutability,
    /// Plan of the nested level
    pub body: EncodeContainer,
}

/// How an encode plan gets its top-level keyed container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncodeRoot {
    /// Create it from the encoder
    Create(Mutability),
    /// Nothing is written by key at the top level
    Skip,
}

/// Complete encode plan for a struct or one enum case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodePlan {
    /// How the top-level container is created
    pub root: EncodeRoot,
    /// The top-level container plan
    pub body: EncodeContainer,
}

/// Plan for a struct declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructPlan {
    /// Declared type name
    pub name: String,
    /// Keys referenced by the plans, in allocation order
    pub keys: Vec<KeyRef>,
    /// Decoding
    pub decode: DecodePlan,
    /// Encoding
    pub encode: EncodePlan,
}

/// Where the discriminant of an internally or adjacently tagged enum lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagAccess {
    /// Binding of the top-level container
    pub root: String,
    /// Containers acquired to reach the tag, outermost first
    pub setup: Vec<Acquisition>,
    /// Binding of the container holding the tag
    pub container: String,
    /// Key of the tag
    pub key: KeyRef,
    /// Kind of the tag values
    pub kind: TagKind,
}

/// Where the payload of an adjacently tagged enum lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentAccess {
    /// Containers acquired to reach the content's parent, outermost first
    pub setup: Vec<Acquisition>,
    /// Binding of the container holding the content
    pub parent: String,
    /// Key of the content
    pub key: KeyRef,
}

/// The discriminant strategy wrapping per-case plans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaggingPlan {
    /// The single key of the top-level container is the discriminant
    External {
        /// Binding of the top-level container
        container: String,
    },
    /// The discriminant sits among the case's own fields
    Internal {
        /// Where the tag is read
        tag: TagAccess,
        /// Where the case payload is decoded from
        content: InternalContent,
    },
    /// Discriminant and payload sit under two keys of one container
    Adjacent {
        /// Where the tag is read
        tag: TagAccess,
        /// Where the payload is decoded from
        content: ContentAccess,
    },
    /// No discriminant: cases are attempted in order, each transactionally
    Untagged {
        /// Case indices in attempt order
        order: Vec<usize>,
    },
}

/// Plan for one enum case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasePlan {
    /// Case name
    pub name: String,
    /// Accepted discriminants; the first is written
    pub tags: Vec<TagValue>,
    /// Key of the case under external tagging
    pub key: Option<KeyRef>,
    /// Decoding of the case payload
    pub decode: DecodePlan,
    /// Encoding of the case payload
    pub encode: EncodePlan,
}

/// Plan for an enum declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumPlan {
    /// Declared type name
    pub name: String,
    /// Keys referenced by any case, in allocation order
    pub keys: Vec<KeyRef>,
    /// Discriminant strategy
    pub tagging: TaggingPlan,
    /// Per-case plans, in declaration order
    pub cases: Vec<CasePlan>,
    /// Case chosen when the discriminant matches nothing
    pub unknown_case: Option<usize>,
}

/// Plan for any declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Plan {
    /// A struct
    Struct(StructPlan),
    /// An enum
    Enum(EnumPlan),
}

impl Plan {
    /// Name of the planned type.
    pub fn name(&self) -> &str {
        match self {
            Plan::Struct(plan) => &plan.name,
            Plan::Enum(plan) => &plan.name,
        }
    }
}
