//! Checking JSON values against declared types.

use pathcodec::{TagKind, TagValue, TypeDescriptor, TypeKind};
use serde_json::Value;

/// Name of a JSON value's kind, for error messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Whether `value` has type `ty`.
///
/// Named types are coded by their own plans and accept any non-null value.
pub(crate) fn conforms(ty: &TypeDescriptor, value: &Value) -> bool {
    if value.is_null() {
        return ty.optional || ty.kind == TypeKind::Any;
    }
    kind_conforms(&ty.kind, value)
}

fn kind_conforms(kind: &TypeKind, value: &Value) -> bool {
    match kind {
        TypeKind::Bool => value.is_boolean(),
        TypeKind::Integer => value.is_i64() || value.is_u64(),
        TypeKind::Float => value.is_number(),
        TypeKind::String => value.is_string(),
        TypeKind::Sequence(inner) => value
            .as_array()
            .is_some_and(|items| items.iter().all(|item| kind_conforms(inner, item))),
        TypeKind::Any => true,
        TypeKind::Named(_) => !value.is_null(),
    }
}

pub(crate) fn tag_to_json(tag: &TagValue) -> Value {
    match tag {
        TagValue::Str(s) => Value::String(s.clone()),
        TagValue::Int(i) => Value::from(*i),
        TagValue::Bool(b) => Value::Bool(*b),
    }
}

/// Read a discriminant of the given kind; `None` if the value has another shape.
pub(crate) fn tag_from_json(kind: TagKind, value: &Value) -> Option<TagValue> {
    match kind {
        TagKind::Str => value.as_str().map(|s| TagValue::Str(s.to_string())),
        TagKind::Int => value.as_i64().map(TagValue::Int),
        TagKind::Bool => value.as_bool().map(TagValue::Bool),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sequences_check_every_element() {
        let ints = TypeDescriptor::sequence(TypeKind::Integer);
        assert!(conforms(&ints, &json!([1, 2, 3])));
        assert!(!conforms(&ints, &json!([1, "2"])));
        assert!(!conforms(&ints, &json!(null)));
        assert!(conforms(&ints.optional(), &json!(null)));
    }

    #[test]
    fn floats_accept_integers_but_not_the_reverse() {
        assert!(conforms(&TypeDescriptor::float(), &json!(3)));
        assert!(!conforms(&TypeDescriptor::integer(), &json!(3.5)));
    }

    #[test]
    fn tags_read_only_their_kind() {
        assert_eq!(tag_from_json(TagKind::Int, &json!(7)), Some(TagValue::Int(7)));
        assert_eq!(tag_from_json(TagKind::Int, &json!("7")), None);
        assert_eq!(tag_to_json(&TagValue::Bool(true)), json!(true));
    }
}
