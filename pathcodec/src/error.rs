//! Configuration errors raised while planning a declaration.

use core::fmt;

use crate::tagging::{TagKind, TaggingRequest};

/// Errors that abort planning for one declaration.
///
/// Other declarations planned alongside it are unaffected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// Two fields of one declaration share a name.
    DuplicateField {
        /// The repeated name
        name: String,
    },
    /// A field lists a dependency that names no field of the declaration.
    UnknownDependency {
        /// The field declaring the dependency
        field: String,
        /// The name that matched nothing
        dependency: String,
        /// Closest existing field name, if any is similar enough
        suggestion: Option<String>,
    },
    /// The dependencies between fields form a cycle.
    DependencyCycle {
        /// Fields participating in the cycle, in declaration order
        fields: Vec<String>,
    },
    /// A dependency exists but cannot be decoded before the field needing it,
    /// because the field's container scope closes first.
    UnorderableDependency {
        /// The field that could not be placed
        field: String,
        /// The dependency that was not available in time
        dependency: String,
    },
    /// A key path is used both as a field's key and as a nested container.
    PathConflict {
        /// The field whose registration clashed
        field: String,
        /// The path shared by the key and the container
        path: Vec<String>,
    },
    /// A multi-binding declaration carries a default list of the wrong length.
    DefaultCountMismatch {
        /// Names of the declared bindings
        bindings: Vec<String>,
        /// Number of defaults supplied
        defaults: usize,
    },
    /// Two tagging requests for one enum cannot be honored together.
    ConflictingTagging {
        /// The request seen first
        first: TaggingRequest,
        /// The request that contradicts it
        second: TaggingRequest,
    },
    /// A tagging request needs a companion request that is missing.
    IncompleteTagging {
        /// The request that cannot stand alone
        request: TaggingRequest,
    },
    /// Internally or adjacently tagged cases use different tag value kinds.
    MixedTagKinds {
        /// Kind used by the first case
        expected: TagKind,
        /// Case whose tag disagrees
        case: String,
        /// Kind that case uses
        found: TagKind,
    },
    /// Externally tagged cases are keyed by their tag, which must be a string.
    NonStringExternalTag {
        /// The offending case
        case: String,
    },
    /// Two cases share one tag value.
    DuplicateTag {
        /// The shared tag value, rendered
        tag: String,
        /// Case that claimed it first
        first: String,
        /// Case that claimed it again
        second: String,
    },
    /// A case whose payload is the whole tagged document has more than one field.
    WholeContentArity {
        /// The offending case
        case: String,
        /// Number of associated fields
        fields: usize,
    },
    /// The designated unknown case does not exist.
    UnknownCaseMissing {
        /// The name that matched no case
        name: String,
    },
    /// The designated unknown case has fields that would need decoding.
    UnknownCaseHasFields {
        /// The case name
        name: String,
    },
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::DuplicateField { name } => {
                write!(f, "field '{name}' is declared more than once")
            }
            PlanError::UnknownDependency {
                field,
                dependency,
                suggestion,
            } => {
                write!(f, "field '{field}' depends on unknown field '{dependency}'")?;
                if let Some(suggestion) = suggestion {
                    write!(f, "; did you mean '{suggestion}'?")?;
                }
                Ok(())
            }
            PlanError::DependencyCycle { fields } => {
                write!(f, "cyclic dependency between fields {fields:?}")
            }
            PlanError::UnorderableDependency { field, dependency } => write!(
                f,
                "field '{field}' depends on '{dependency}', which is only decoded after \
                 the container holding '{field}' is closed"
            ),
            PlanError::PathConflict { field, path } => write!(
                f,
                "field '{field}' uses path '{}' both as a value key and as a nested container",
                path.join(".")
            ),
            PlanError::DefaultCountMismatch { bindings, defaults } => write!(
                f,
                "{defaults} default values given for {} bindings {bindings:?}; \
                 expected none, one, or one per binding",
                bindings.len()
            ),
            PlanError::ConflictingTagging { first, second } => {
                write!(f, "tagging request {second} conflicts with {first}")
            }
            PlanError::IncompleteTagging { request } => {
                write!(f, "tagging request {request} requires a tag path")
            }
            PlanError::MixedTagKinds {
                expected,
                case,
                found,
            } => write!(
                f,
                "case '{case}' uses a {found} tag but earlier cases use {expected} tags"
            ),
            PlanError::NonStringExternalTag { case } => write!(
                f,
                "case '{case}' is externally tagged, so its tag must be a string"
            ),
            PlanError::DuplicateTag { tag, first, second } => {
                write!(f, "tag {tag} is used by both '{first}' and '{second}'")
            }
            PlanError::WholeContentArity { case, fields } => write!(
                f,
                "case '{case}' has {fields} fields, but whole-document content allows at most one"
            ),
            PlanError::UnknownCaseMissing { name } => {
                write!(f, "unknown-case fallback '{name}' is not a case of the enum")
            }
            PlanError::UnknownCaseHasFields { name } => write!(
                f,
                "unknown-case fallback '{name}' must not have decodable fields"
            ),
        }
    }
}

impl std::error::Error for PlanError {}
