//! Running encode plans into a JSON document.

use pathcodec::{
    EncodeContainer, EncodePlan, EncodeRoot, EnumPlan, FieldEncode, Mutability, Statement,
    StructPlan, TaggingPlan,
};
use serde_json::{Map, Value};

use crate::error::{EncodeError, EncodeErrorKind, KeyPath};
use crate::hooks::Hooks;
use crate::value::{json_kind, tag_to_json};
use crate::{EnumValue, Record, debug, trace};

/// Encode the fields of a struct into a document.
pub fn encode_struct(plan: &StructPlan, record: &Record, hooks: &Hooks) -> Result<Value, EncodeError> {
    debug!(name = %plan.name, "encoding struct");
    Encoder::new(hooks, record).run_plan(&plan.encode, KeyPath::default())
}

/// Encode one case of an enum into a document.
pub fn encode_enum(plan: &EnumPlan, value: &EnumValue, hooks: &Hooks) -> Result<Value, EncodeError> {
    debug!(name = %plan.name, case = %value.case, "encoding enum");
    let case = plan
        .cases
        .iter()
        .find(|case| case.name == value.case)
        .ok_or_else(|| {
            EncodeError::new(
                EncodeErrorKind::UnknownCase(value.case.clone()),
                KeyPath::default(),
            )
        })?;
    let encoder = Encoder::new(hooks, &value.fields);

    match &plan.tagging {
        TaggingPlan::External { .. } => {
            let key = case
                .key
                .as_ref()
                .map_or_else(|| case.name.clone(), |key| key.name.clone());
            let payload = encoder.run_plan(&case.encode, KeyPath(vec![key.clone()]))?;
            let mut root = Map::new();
            root.insert(key, payload);
            Ok(Value::Object(root))
        }
        // the case plan writes the tag itself
        TaggingPlan::Internal { .. } | TaggingPlan::Untagged { .. } => {
            encoder.run_plan(&case.encode, KeyPath::default())
        }
        TaggingPlan::Adjacent { tag, content } => {
            let mut root = Map::new();
            let tag_value = case
                .tags
                .first()
                .map_or_else(|| Value::String(case.name.clone()), tag_to_json);
            let tag_path: Vec<String> = tag
                .setup
                .iter()
                .map(|acquisition| acquisition.key.name.clone())
                .chain([tag.key.name.clone()])
                .collect();
            insert_at(&mut root, &tag_path, tag_value);

            let content_path: Vec<String> = content
                .setup
                .iter()
                .map(|acquisition| acquisition.key.name.clone())
                .chain([content.key.name.clone()])
                .collect();
            let payload = encoder.run_plan(&case.encode, KeyPath(content_path.clone()))?;
            if !payload.is_null() {
                insert_at(&mut root, &content_path, payload);
            }
            Ok(Value::Object(root))
        }
    }
}

/// Store `value` at `path`, creating objects on the way.
fn insert_at(map: &mut Map<String, Value>, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = map;
    for key in parents {
        let entry = current
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(next) = entry else {
            return;
        };
        current = next;
    }
    current.insert(last.clone(), value);
}

struct Encoder<'h, 'r> {
    hooks: &'h Hooks,
    record: &'r Record,
    scalar: Option<Value>,
}

impl<'h, 'r> Encoder<'h, 'r> {
    fn new(hooks: &'h Hooks, record: &'r Record) -> Self {
        Self {
            hooks,
            record,
            scalar: None,
        }
    }

    fn run_plan(mut self, plan: &EncodePlan, path: KeyPath) -> Result<Value, EncodeError> {
        let mut root = Map::new();
        let skip = plan.root == EncodeRoot::Skip;
        self.container(&plan.body, &mut root, &path, skip)?;

        Ok(match (plan.root, self.scalar) {
            (EncodeRoot::Create(_), _) => Value::Object(root),
            (EncodeRoot::Skip, Some(scalar)) => scalar,
            (EncodeRoot::Skip, None) if root.is_empty() => Value::Null,
            (EncodeRoot::Skip, None) => Value::Object(root),
        })
    }

    /// Fill `map` from one container level. Only the top level of a plan
    /// without a keyed root may hold a bare, non-object value.
    fn container(
        &mut self,
        body: &EncodeContainer,
        map: &mut Map<String, Value>,
        path: &KeyPath,
        scalar_ok: bool,
    ) -> Result<(), EncodeError> {
        self.run(&body.statements, map, path, scalar_ok)?;

        for branch in &body.branches {
            let mut child = Map::new();
            let child_path = path.child(&branch.key.name);
            self.container(&branch.body, &mut child, &child_path, false)?;
            if branch.mutability == Mutability::Immutable || !child.is_empty() {
                map.insert(branch.key.name.clone(), Value::Object(child));
            } else {
                trace!(container = %branch.container, "nothing written, container omitted");
            }
        }
        Ok(())
    }

    fn run(
        &mut self,
        statements: &[Statement],
        map: &mut Map<String, Value>,
        path: &KeyPath,
        scalar_ok: bool,
    ) -> Result<(), EncodeError> {
        for statement in statements {
            match statement {
                Statement::Encode(write) => self.write(write, map, path, scalar_ok)?,
                Statement::EncodeTag(tag) => {
                    map.insert(tag.key.name.clone(), tag_to_json(&tag.value));
                }
                Statement::Conditional {
                    predicate,
                    then,
                    otherwise,
                } => {
                    let check = self.hooks.encode_predicate(&predicate.0).ok_or_else(|| {
                        EncodeError::new(
                            EncodeErrorKind::UnknownPredicate(predicate.0.clone()),
                            path.clone(),
                        )
                    })?;
                    let holds = check(self.record);
                    self.run(if holds { then } else { otherwise }, map, path, scalar_ok)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn write(
        &mut self,
        write: &FieldEncode,
        map: &mut Map<String, Value>,
        path: &KeyPath,
        scalar_ok: bool,
    ) -> Result<(), EncodeError> {
        let value = match self.record.get(&write.field) {
            Some(Value::Null) | None if write.ty.optional => return Ok(()),
            Some(value) => value,
            None => {
                return Err(EncodeError::new(
                    EncodeErrorKind::MissingField {
                        field: write.field.clone(),
                    },
                    path.clone(),
                ));
            }
        };

        let value = match &write.converter {
            Some(name) => {
                let converter = self.hooks.converter(&name.0).ok_or_else(|| {
                    EncodeError::new(
                        EncodeErrorKind::UnknownConverter(name.0.clone()),
                        path.clone(),
                    )
                })?;
                converter.encode(value).map_err(|message| {
                    EncodeError::new(
                        EncodeErrorKind::Converter {
                            field: write.field.clone(),
                            converter: name.0.clone(),
                            message,
                        },
                        path.clone(),
                    )
                })?
            }
            None => value.clone(),
        };

        match (&write.key, value) {
            (Some(key), value) => {
                map.insert(key.name.clone(), value);
            }
            (None, Value::Object(entries)) => map.extend(entries),
            (None, value) if scalar_ok && map.is_empty() && self.scalar.is_none() => {
                self.scalar = Some(value);
            }
            (None, value) => {
                return Err(EncodeError::new(
                    EncodeErrorKind::NotAnObject {
                        field: write.field.clone(),
                        found: json_kind(&value),
                    },
                    path.clone(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_at_creates_intermediate_objects() {
        let mut root = Map::new();
        insert_at(&mut root, &["a".into(), "b".into()], json!(1));
        insert_at(&mut root, &["a".into(), "c".into()], json!(2));
        insert_at(&mut root, &["top".into()], json!(true));
        assert_eq!(
            Value::Object(root),
            json!({"a": {"b": 1, "c": 2}, "top": true})
        );
    }
}
