#![warn(missing_docs)]
#![forbid(unsafe_code)]
//! Runs [`pathcodec`] plans against [`serde_json`] documents.
//!
//! Plans are pure data, so this crate executes them the way generated code
//! would: containers are acquired, hoisted or guarded as the plan says,
//! fallbacks run their recovery statements, and converters and predicates
//! are looked up by name in a [`Hooks`] registry.
//!
//! Field values live in a [`Record`], keyed by field name. A decoded
//! optional field that had no value holds `null`.
//!
//! ```
//! use pathcodec::{FieldDescriptor, PlannerOptions, StructDeclaration, TypeDescriptor};
//! use pathcodec_json::{Hooks, decode_struct, encode_struct};
//! use serde_json::json;
//!
//! let plan = StructDeclaration::new("User")
//!     .with_field(FieldDescriptor::new("id", TypeDescriptor::integer()).coded_at(["meta", "id"]))
//!     .plan(&PlannerOptions::default())
//!     .unwrap();
//!
//! let hooks = Hooks::new();
//! let document = json!({"meta": {"id": 7}});
//! let record = decode_struct(&plan, &document, &hooks).unwrap();
//! assert_eq!(record["id"], json!(7));
//! assert_eq!(encode_struct(&plan, &record, &hooks).unwrap(), document);
//! ```

/// Trace-level logging macro that forwards to `tracing::trace!` when the `tracing` feature is enabled.
#[cfg(feature = "tracing")]
#[macro_export]
#[doc(hidden)]
macro_rules! trace {
    ($($arg:tt)*) => {
        ::tracing::trace!($($arg)*)
    };
}

/// Trace-level logging macro (no-op when `tracing` feature is disabled).
#[cfg(not(feature = "tracing"))]
#[macro_export]
#[doc(hidden)]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

/// Debug-level logging macro that forwards to `tracing::debug!` when the `tracing` feature is enabled.
#[cfg(feature = "tracing")]
#[macro_export]
#[doc(hidden)]
macro_rules! debug {
    ($($arg:tt)*) => {
        ::tracing::debug!($($arg)*)
    };
}

/// Debug-level logging macro (no-op when `tracing` feature is disabled).
#[cfg(not(feature = "tracing"))]
#[macro_export]
#[doc(hidden)]
macro_rules! debug {
    ($($arg:tt)*) => {};
}

mod decode;
mod encode;
mod error;
mod hooks;
mod value;

use indexmap::IndexMap;
use serde_json::Value;

pub use decode::{decode_enum, decode_struct};
pub use encode::{encode_enum, encode_struct};
pub use error::{DecodeError, DecodeErrorKind, EncodeError, EncodeErrorKind, KeyPath};
pub use hooks::{Converter, FnConverter, Hooks};

/// Field values by field name, in assignment order.
pub type Record = IndexMap<String, Value>;

/// One enum case and its field values.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    /// Case name
    pub case: String,
    /// Field values of the case
    pub fields: Record,
}

impl EnumValue {
    /// A case without fields.
    pub fn new(case: impl Into<String>) -> Self {
        Self {
            case: case.into(),
            fields: Record::new(),
        }
    }

    /// A case with the given fields.
    pub fn with_fields(case: impl Into<String>, fields: Record) -> Self {
        Self {
            case: case.into(),
            fields,
        }
    }

    /// Add one field value.
    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.fields.insert(field.into(), value);
        self
    }
}
