//! Errors raised while running a plan against a document.

use core::fmt::{self, Display};

use pathcodec::{Failure, TypeDescriptor};

/// Location of a failure: the keys leading to the container being worked on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPath(pub Vec<String>);

impl KeyPath {
    pub(crate) fn child(&self, key: &str) -> KeyPath {
        let mut path = self.0.clone();
        path.push(key.to_string());
        KeyPath(path)
    }
}

impl Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(key)?;
        }
        Ok(())
    }
}

/// Error type for decoding a document with a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeError {
    /// The specific kind of error
    pub kind: DecodeErrorKind,
    /// Container in which the error occurred
    pub path: KeyPath,
}

impl DecodeError {
    /// Create a new error at `path`.
    pub const fn new(kind: DecodeErrorKind, path: KeyPath) -> Self {
        DecodeError { kind, path }
    }

    /// Create an error at the top-level container.
    pub const fn at_root(kind: DecodeErrorKind) -> Self {
        DecodeError {
            kind,
            path: KeyPath(Vec::new()),
        }
    }
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at {})", self.kind, self.path)
    }
}

impl std::error::Error for DecodeError {}

/// Specific error kinds for decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeErrorKind {
    /// A key had no value and nothing recovers from it
    MissingKey {
        /// The key
        key: String,
    },
    /// A value had to be a keyed container and was not
    NotAContainer {
        /// Key of the value; `None` for the document itself
        key: Option<String>,
        /// JSON kind found instead
        found: &'static str,
    },
    /// A value did not have the field's type
    TypeMismatch {
        /// Field being decoded
        field: String,
        /// Declared type
        expected: TypeDescriptor,
        /// JSON kind found instead
        found: &'static str,
    },
    /// A converter rejected a value
    Converter {
        /// Field being decoded
        field: String,
        /// Converter name
        converter: String,
        /// What the converter reported
        message: String,
    },
    /// A required field got no value
    MissingField {
        /// Field name
        field: String,
    },
    /// A default expression is not a JSON literal
    InvalidDefault {
        /// Field receiving the default
        field: String,
        /// The expression
        expr: String,
    },
    /// The plan names a converter that was not registered
    UnknownConverter(String),
    /// The plan names a predicate that was not registered
    UnknownPredicate(String),
    /// The plan reads from a container it never bound
    UnboundContainer(String),
    /// A structural failure raised by the plan
    Failed(Failure),
}

impl Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeErrorKind::MissingKey { key } => write!(f, "missing key '{key}'"),
            DecodeErrorKind::NotAContainer { key: Some(key), found } => {
                write!(f, "expected an object under '{key}', found {found}")
            }
            DecodeErrorKind::NotAContainer { key: None, found } => {
                write!(f, "expected an object, found {found}")
            }
            DecodeErrorKind::TypeMismatch {
                field,
                expected,
                found,
            } => write!(f, "field '{field}' expects {expected}, found {found}"),
            DecodeErrorKind::Converter {
                field,
                converter,
                message,
            } => write!(f, "converter '{converter}' rejected field '{field}': {message}"),
            DecodeErrorKind::MissingField { field } => write!(f, "missing field '{field}'"),
            DecodeErrorKind::InvalidDefault { field, expr } => {
                write!(f, "default of field '{field}' is not a JSON literal: {expr}")
            }
            DecodeErrorKind::UnknownConverter(name) => write!(f, "no converter named '{name}'"),
            DecodeErrorKind::UnknownPredicate(name) => write!(f, "no predicate named '{name}'"),
            DecodeErrorKind::UnboundContainer(name) => {
                write!(f, "container '{name}' was never acquired")
            }
            DecodeErrorKind::Failed(failure) => match failure {
                Failure::MissingDiscriminant => f.write_str("missing discriminant"),
                Failure::AmbiguousDiscriminant => f.write_str("ambiguous discriminant"),
                Failure::UnknownDiscriminant => f.write_str("unknown discriminant"),
                Failure::NoCaseMatched => f.write_str("no case matched"),
                Failure::Custom(message) => f.write_str(message),
            },
        }
    }
}

/// Error type for encoding a value with a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeError {
    /// The specific kind of error
    pub kind: EncodeErrorKind,
    /// Container in which the error occurred
    pub path: KeyPath,
}

impl EncodeError {
    /// Create a new error at `path`.
    pub const fn new(kind: EncodeErrorKind, path: KeyPath) -> Self {
        EncodeError { kind, path }
    }
}

impl Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at {})", self.kind, self.path)
    }
}

impl std::error::Error for EncodeError {}

/// Specific error kinds for encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodeErrorKind {
    /// A non-optional field has no value in the record
    MissingField {
        /// Field name
        field: String,
    },
    /// A flattened value must be an object to merge into its container
    NotAnObject {
        /// Field being encoded
        field: String,
        /// JSON kind found instead
        found: &'static str,
    },
    /// A converter rejected a value
    Converter {
        /// Field being encoded
        field: String,
        /// Converter name
        converter: String,
        /// What the converter reported
        message: String,
    },
    /// The value names a case the plan does not have
    UnknownCase(String),
    /// The plan names a converter that was not registered
    UnknownConverter(String),
    /// The plan names a predicate that was not registered
    UnknownPredicate(String),
}

impl Display for EncodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeErrorKind::MissingField { field } => write!(f, "no value for field '{field}'"),
            EncodeErrorKind::NotAnObject { field, found } => {
                write!(f, "flattened field '{field}' must be an object, found {found}")
            }
            EncodeErrorKind::Converter {
                field,
                converter,
                message,
            } => write!(f, "converter '{converter}' rejected field '{field}': {message}"),
            EncodeErrorKind::UnknownCase(name) => write!(f, "no case named '{name}'"),
            EncodeErrorKind::UnknownConverter(name) => write!(f, "no converter named '{name}'"),
            EncodeErrorKind::UnknownPredicate(name) => write!(f, "no predicate named '{name}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_the_location() {
        let err = DecodeError::new(
            DecodeErrorKind::MissingKey { key: "id".into() },
            KeyPath(vec!["meta".into(), "inner".into()]),
        );
        assert_eq!(err.to_string(), "missing key 'id' (at meta.inner)");

        let err = DecodeError::at_root(DecodeErrorKind::Failed(Failure::NoCaseMatched));
        assert_eq!(err.to_string(), "no case matched (at <root>)");
    }
}
