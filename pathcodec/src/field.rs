//! Field descriptors and the customizations that shape them.
//!
//! A [`FieldDescriptor`] is the normalized form of one declared field. The
//! collaborator that scans declarations builds one per field by applying
//! [`FieldCustomization`]s, each of which returns an updated descriptor.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::fallback::FallbackPolicy;
use crate::plan::Statement;

/// Shape of a field value, as far as coding is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    /// `true` / `false`
    Bool,
    /// Whole numbers
    Integer,
    /// Any number
    Float,
    /// Text
    String,
    /// An unkeyed sequence of the inner kind
    Sequence(Box<TypeKind>),
    /// Anything at all
    Any,
    /// A user type coded by its own plan
    Named(String),
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Bool => f.write_str("Bool"),
            TypeKind::Integer => f.write_str("Int"),
            TypeKind::Float => f.write_str("Float"),
            TypeKind::String => f.write_str("String"),
            TypeKind::Sequence(inner) => write!(f, "[{inner}]"),
            TypeKind::Any => f.write_str("Any"),
            TypeKind::Named(name) => f.write_str(name),
        }
    }
}

/// A field's type: its kind and whether it may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// What the value looks like when present
    pub kind: TypeKind,
    /// Optional values are read and written "if present"
    pub optional: bool,
}

impl TypeDescriptor {
    /// A required value of the given kind.
    pub const fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            optional: false,
        }
    }

    /// A required boolean.
    pub const fn bool() -> Self {
        Self::new(TypeKind::Bool)
    }

    /// A required integer.
    pub const fn integer() -> Self {
        Self::new(TypeKind::Integer)
    }

    /// A required number.
    pub const fn float() -> Self {
        Self::new(TypeKind::Float)
    }

    /// A required string.
    pub const fn string() -> Self {
        Self::new(TypeKind::String)
    }

    /// A value of any shape.
    pub const fn any() -> Self {
        Self::new(TypeKind::Any)
    }

    /// A user-defined type.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(TypeKind::Named(name.into()))
    }

    /// A sequence of `inner`.
    pub fn sequence(inner: TypeKind) -> Self {
        Self::new(TypeKind::Sequence(Box::new(inner)))
    }

    /// The same type, made optional.
    pub fn optional(self) -> Self {
        Self {
            optional: true,
            ..self
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if self.optional {
            f.write_str("?")?;
        }
        Ok(())
    }
}

/// Source text of a default-value expression.
///
/// The planner never looks inside it; the emitter splices it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DefaultExpr(pub String);

impl DefaultExpr {
    /// Wrap an expression.
    pub fn new(expr: impl Into<String>) -> Self {
        Self(expr.into())
    }
}

impl fmt::Display for DefaultExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a custom converter that replaces the default coding of a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConverterRef(pub String);

impl fmt::Display for ConverterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a condition evaluated by generated code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Predicate(pub String);

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A default value and when it applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultValue {
    /// The value to assign
    pub expr: DefaultExpr,
    /// Also assign it when the value is present but cannot be decoded
    pub on_error: bool,
}

/// One customization applied to a field.
///
/// Every annotation the declaration scanner understands is normalized into
/// one of these; [`FieldDescriptor::customize`] is the single visitor that
/// folds them into a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldCustomization {
    /// Full key path of the value; the last segment is the value's key
    CodedAt(Vec<String>),
    /// Container path; the value is keyed by the field name inside it
    CodedIn(Vec<String>),
    /// Decode from and encode into the enclosing container's coder itself
    Flatten,
    /// Value used when the encoded value is missing (or invalid)
    Default(DefaultValue),
    /// Custom converter for the value
    Converter(ConverterRef),
    /// Never decode; the field keeps its default
    IgnoreDecoding,
    /// Never encode
    IgnoreEncoding,
    /// Neither decode nor encode
    IgnoreCoding,
    /// Decode only when the predicate holds
    DecodeWhen(Predicate),
    /// Skip encoding when the predicate holds
    SkipEncodingIf(Predicate),
    /// Decode only after the named field
    DependsOn(String),
    /// Explicit failure-handling policy, replacing the derived one
    Fallback(FallbackPolicy),
}

/// Normalized description of one declared field.
///
/// Descriptors are values: every builder method consumes the descriptor and
/// returns the updated one.
///
/// # Example
///
/// ```
/// use pathcodec::{FieldDescriptor, TypeDescriptor};
///
/// let field = FieldDescriptor::new("id", TypeDescriptor::integer())
///     .coded_at(["meta", "identifier"])
///     .with_default("0");
/// assert_eq!(field.key_path(), ["meta", "identifier"]);
/// assert!(field.is_decoded());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Declared name
    pub name: String,
    /// Declared type
    pub ty: TypeDescriptor,
    /// Explicit key path; empty means "keyed by `name` at the top level"
    pub path: Vec<String>,
    /// Coded by the container's coder itself rather than under a key
    pub flatten: bool,
    /// `Some(false)` disables decoding; `None` means yes
    pub decode: Option<bool>,
    /// `Some(false)` disables encoding; `None` means yes
    pub encode: Option<bool>,
    /// Default value
    pub default: Option<DefaultValue>,
    /// Custom converter
    pub converter: Option<ConverterRef>,
    /// Names of fields that must be decoded first
    pub depends_on: Vec<String>,
    /// Explicit failure-handling override
    pub fallback: Option<FallbackPolicy>,
    /// Decode only when this holds
    pub decode_when: Option<Predicate>,
    /// Skip encoding when this holds
    pub skip_encoding_if: Option<Predicate>,
}

impl FieldDescriptor {
    /// A field keyed by its own name at the top level.
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
            path: Vec::new(),
            flatten: false,
            decode: None,
            encode: None,
            default: None,
            converter: None,
            depends_on: Vec::new(),
            fallback: None,
            decode_when: None,
            skip_encoding_if: None,
        }
    }

    /// Apply one customization.
    pub fn customize(mut self, customization: FieldCustomization) -> Self {
        match customization {
            FieldCustomization::CodedAt(path) => {
                self.path = path;
                self.flatten = false;
            }
            FieldCustomization::CodedIn(mut path) => {
                path.push(self.name.clone());
                self.path = path;
                self.flatten = false;
            }
            FieldCustomization::Flatten => self.flatten = true,
            FieldCustomization::Default(default) => self.default = Some(default),
            FieldCustomization::Converter(converter) => self.converter = Some(converter),
            FieldCustomization::IgnoreDecoding => self.decode = Some(false),
            FieldCustomization::IgnoreEncoding => self.encode = Some(false),
            FieldCustomization::IgnoreCoding => {
                self.decode = Some(false);
                self.encode = Some(false);
            }
            FieldCustomization::DecodeWhen(predicate) => self.decode_when = Some(predicate),
            FieldCustomization::SkipEncodingIf(predicate) => {
                self.skip_encoding_if = Some(predicate)
            }
            FieldCustomization::DependsOn(name) => {
                if !self.depends_on.contains(&name) {
                    self.depends_on.push(name);
                }
            }
            FieldCustomization::Fallback(policy) => self.fallback = Some(policy),
        }
        self
    }

    /// Apply several customizations in order.
    pub fn customize_all(self, customizations: impl IntoIterator<Item = FieldCustomization>) -> Self {
        customizations
            .into_iter()
            .fold(self, |field, customization| field.customize(customization))
    }

    /// Set the full key path.
    pub fn coded_at<I, S>(self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.customize(FieldCustomization::CodedAt(
            path.into_iter().map(Into::into).collect(),
        ))
    }

    /// Key the field by its own name inside the given container path.
    pub fn coded_in<I, S>(self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.customize(FieldCustomization::CodedIn(
            path.into_iter().map(Into::into).collect(),
        ))
    }

    /// Code the field with the container's own coder.
    pub fn flattened(self) -> Self {
        self.customize(FieldCustomization::Flatten)
    }

    /// Default used when the value is missing.
    pub fn with_default(self, expr: impl Into<String>) -> Self {
        self.customize(FieldCustomization::Default(DefaultValue {
            expr: DefaultExpr::new(expr),
            on_error: false,
        }))
    }

    /// Default used when the value is missing or cannot be decoded.
    pub fn with_default_on_error(self, expr: impl Into<String>) -> Self {
        self.customize(FieldCustomization::Default(DefaultValue {
            expr: DefaultExpr::new(expr),
            on_error: true,
        }))
    }

    /// Code the value through a named converter.
    pub fn coded_by(self, converter: impl Into<String>) -> Self {
        self.customize(FieldCustomization::Converter(ConverterRef(converter.into())))
    }

    /// Never decode this field.
    pub fn ignore_decoding(self) -> Self {
        self.customize(FieldCustomization::IgnoreDecoding)
    }

    /// Never encode this field.
    pub fn ignore_encoding(self) -> Self {
        self.customize(FieldCustomization::IgnoreEncoding)
    }

    /// Neither decode nor encode this field.
    pub fn ignore_coding(self) -> Self {
        self.customize(FieldCustomization::IgnoreCoding)
    }

    /// Decode only when `predicate` holds.
    pub fn decode_when(self, predicate: impl Into<String>) -> Self {
        self.customize(FieldCustomization::DecodeWhen(Predicate(predicate.into())))
    }

    /// Skip encoding when `predicate` holds.
    pub fn skip_encoding_if(self, predicate: impl Into<String>) -> Self {
        self.customize(FieldCustomization::SkipEncodingIf(Predicate(predicate.into())))
    }

    /// Decode after the named field.
    pub fn depends_on(self, field: impl Into<String>) -> Self {
        self.customize(FieldCustomization::DependsOn(field.into()))
    }

    /// Replace the derived failure-handling policy.
    pub fn with_fallback(self, policy: FallbackPolicy) -> Self {
        self.customize(FieldCustomization::Fallback(policy))
    }

    /// Whether generated code reads this field.
    pub fn is_decoded(&self) -> bool {
        self.decode != Some(false)
    }

    /// Whether generated code writes this field.
    pub fn is_encoded(&self) -> bool {
        self.encode != Some(false)
    }

    /// Whether encoding this field may be skipped at runtime.
    pub fn encodes_conditionally(&self) -> bool {
        self.skip_encoding_if.is_some()
    }

    /// The effective key path: the explicit path, or the field name at the top level.
    ///
    /// Flattened fields use their explicit path as a container path (often empty).
    pub fn key_path(&self) -> Vec<String> {
        if self.path.is_empty() && !self.flatten {
            vec![self.name.clone()]
        } else {
            self.path.clone()
        }
    }

    /// Statements giving the field its value without reading it.
    ///
    /// Empty for a required field without a default.
    pub fn placeholder(&self) -> Vec<Statement> {
        if let Some(default) = &self.default {
            vec![Statement::AssignDefault {
                field: self.name.clone(),
                value: default.expr.clone(),
            }]
        } else if self.ty.optional {
            vec![Statement::AssignNone {
                field: self.name.clone(),
            }]
        } else {
            Vec::new()
        }
    }

    /// The policy this field asks for on the containers along its path.
    ///
    /// Plain required fields have no opinion, so they do not weaken or
    /// strengthen what their siblings ask for.
    pub fn container_fallback(&self) -> Option<FallbackPolicy> {
        if let Some(policy) = &self.fallback {
            return Some(policy.clone());
        }
        match &self.default {
            Some(default) if default.on_error => Some(FallbackPolicy::IfMissingOrInvalid {
                missing: self.placeholder(),
                invalid: self.placeholder(),
            }),
            Some(_) => Some(FallbackPolicy::OnlyIfMissing(self.placeholder())),
            None if self.ty.optional => Some(FallbackPolicy::OnlyIfMissing(self.placeholder())),
            None => None,
        }
    }

    /// The policy governing the field's own key.
    pub fn key_fallback(&self) -> FallbackPolicy {
        self.container_fallback().unwrap_or(FallbackPolicy::Throw)
    }

    /// Whether decoding must produce a value for this field or fail.
    pub fn is_required(&self) -> bool {
        self.is_decoded() && self.key_fallback().is_throw() && self.decode_when.is_none()
    }
}

/// One declaration introducing several bindings that share a type and
/// customizations, such as `let a, b: Int = 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingGroup {
    /// Names of the bindings, in declaration order
    pub names: Vec<String>,
    /// Shared type
    pub ty: TypeDescriptor,
    /// Default expressions: none, one shared, or one per binding
    pub defaults: Vec<DefaultExpr>,
    /// Whether the defaults also apply to invalid values
    pub default_on_error: bool,
    /// Customizations applied to every binding
    pub customizations: Vec<FieldCustomization>,
}

impl BindingGroup {
    /// A group of bindings of one type.
    pub fn new<I, S>(names: I, ty: TypeDescriptor) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            ty,
            defaults: Vec::new(),
            default_on_error: false,
            customizations: Vec::new(),
        }
    }

    /// Add a default expression.
    pub fn with_default(mut self, expr: impl Into<String>) -> Self {
        self.defaults.push(DefaultExpr::new(expr));
        self
    }

    /// Add a customization shared by every binding.
    pub fn with(mut self, customization: FieldCustomization) -> Self {
        self.customizations.push(customization);
        self
    }

    /// Produce one descriptor per binding.
    ///
    /// A shared full key path would put every binding on the same key, so
    /// [`FieldCustomization::CodedAt`] is read as a container path here.
    pub fn expand(&self) -> Result<Vec<FieldDescriptor>, PlanError> {
        let defaults = match self.defaults.len() {
            0 => vec![None; self.names.len()],
            1 => vec![Some(self.defaults[0].clone()); self.names.len()],
            n if n == self.names.len() => self.defaults.iter().cloned().map(Some).collect(),
            n => {
                return Err(PlanError::DefaultCountMismatch {
                    bindings: self.names.clone(),
                    defaults: n,
                });
            }
        };

        let shared = self.customizations.iter().cloned().map(|c| match c {
            FieldCustomization::CodedAt(path) if self.names.len() > 1 => {
                FieldCustomization::CodedIn(path)
            }
            other => other,
        });
        let shared: Vec<_> = shared.collect();

        Ok(self
            .names
            .iter()
            .zip(defaults)
            .map(|(name, default)| {
                let field = FieldDescriptor::new(name.clone(), self.ty.clone())
                    .customize_all(shared.iter().cloned());
                match default {
                    Some(expr) => field.customize(FieldCustomization::Default(DefaultValue {
                        expr,
                        on_error: self.default_on_error,
                    })),
                    None => field,
                }
            })
            .collect())
    }
}
