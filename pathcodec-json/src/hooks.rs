//! Named callbacks that plans refer to: converters and predicates.

use std::collections::HashMap;

use serde_json::Value;

use crate::Record;

/// Replaces the default coding of one value.
pub trait Converter: Send + Sync {
    /// Turn the stored JSON value into the field value.
    fn decode(&self, value: &Value) -> Result<Value, String>;

    /// Turn the field value into the JSON value to store.
    fn encode(&self, value: &Value) -> Result<Value, String>;
}

/// A converter built from two closures.
pub struct FnConverter<D, E> {
    decode: D,
    encode: E,
}

impl<D, E> FnConverter<D, E>
where
    D: Fn(&Value) -> Result<Value, String> + Send + Sync,
    E: Fn(&Value) -> Result<Value, String> + Send + Sync,
{
    /// Pair a decoding and an encoding closure.
    pub fn new(decode: D, encode: E) -> Self {
        Self { decode, encode }
    }
}

impl<D, E> Converter for FnConverter<D, E>
where
    D: Fn(&Value) -> Result<Value, String> + Send + Sync,
    E: Fn(&Value) -> Result<Value, String> + Send + Sync,
{
    fn decode(&self, value: &Value) -> Result<Value, String> {
        (self.decode)(value)
    }

    fn encode(&self, value: &Value) -> Result<Value, String> {
        (self.encode)(value)
    }
}

type PredicateFn = Box<dyn Fn(&Record) -> bool + Send + Sync>;

/// Registry of everything a plan may call by name.
///
/// Decode predicates see the fields decoded so far; encode predicates see
/// the record being encoded.
#[derive(Default)]
pub struct Hooks {
    converters: HashMap<String, Box<dyn Converter>>,
    decode_predicates: HashMap<String, PredicateFn>,
    encode_predicates: HashMap<String, PredicateFn>,
}

impl Hooks {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a converter.
    pub fn with_converter(
        mut self,
        name: impl Into<String>,
        converter: impl Converter + 'static,
    ) -> Self {
        self.converters.insert(name.into(), Box::new(converter));
        self
    }

    /// Register a condition for `decode_when`.
    pub fn with_decode_predicate(
        mut self,
        name: impl Into<String>,
        predicate: impl Fn(&Record) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.decode_predicates
            .insert(name.into(), Box::new(predicate));
        self
    }

    /// Register a condition for `skip_encoding_if`.
    pub fn with_encode_predicate(
        mut self,
        name: impl Into<String>,
        predicate: impl Fn(&Record) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.encode_predicates
            .insert(name.into(), Box::new(predicate));
        self
    }

    pub(crate) fn converter(&self, name: &str) -> Option<&dyn Converter> {
        self.converters.get(name).map(|converter| &**converter)
    }

    pub(crate) fn decode_predicate(&self, name: &str) -> Option<&PredicateFn> {
        self.decode_predicates.get(name)
    }

    pub(crate) fn encode_predicate(&self, name: &str) -> Option<&PredicateFn> {
        self.encode_predicates.get(name)
    }
}

impl core::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hooks")
            .field("converters", &self.converters.keys().collect::<Vec<_>>())
            .field(
                "decode_predicates",
                &self.decode_predicates.keys().collect::<Vec<_>>(),
            )
            .field(
                "encode_predicates",
                &self.encode_predicates.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}
