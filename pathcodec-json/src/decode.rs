//! Running decode plans over a JSON document.

use std::collections::HashMap;

use pathcodec::{
    Acquisition, BranchAcquisition, CasePlan, DecodeContainer, DecodePlan, DecodeRoot, EnumPlan,
    Failure, FieldDecode, Statement, StructPlan, TagAccess, TaggingPlan,
};
use serde_json::Value;

use crate::error::{DecodeError, DecodeErrorKind, KeyPath};
use crate::hooks::Hooks;
use crate::value::{conforms, json_kind, tag_from_json};
use crate::{EnumValue, Record, debug, trace};

static NULL: Value = Value::Null;

/// Decode a document into the fields of a struct.
pub fn decode_struct(
    plan: &StructPlan,
    document: &Value,
    hooks: &Hooks,
) -> Result<Record, DecodeError> {
    debug!(name = %plan.name, "decoding struct");
    Decoder::new(hooks).run_plan(&plan.decode, document, KeyPath::default())
}

/// Decode a document into one case of an enum.
pub fn decode_enum(
    plan: &EnumPlan,
    document: &Value,
    hooks: &Hooks,
) -> Result<EnumValue, DecodeError> {
    debug!(name = %plan.name, "decoding enum");
    match &plan.tagging {
        TaggingPlan::External { .. } => decode_external(plan, document, hooks),
        TaggingPlan::Internal { tag, .. } => {
            let mut decoder = Decoder::new(hooks);
            let case = decoder.read_tag(plan, tag, document)?;
            let fields = decoder.run_plan(&case.decode, document, KeyPath::default())?;
            Ok(EnumValue::with_fields(&case.name, fields))
        }
        TaggingPlan::Adjacent { tag, content } => {
            let mut decoder = Decoder::new(hooks);
            let case = decoder.read_tag(plan, tag, document)?;
            for acquisition in &content.setup {
                decoder.acquire(acquisition)?;
            }
            let parent = decoder.bound(&content.parent)?.clone();
            let path = parent.path.child(&content.key.name);
            let payload = match parent
                .value
                .as_object()
                .and_then(|object| object.get(&content.key.name))
            {
                Some(payload) => payload,
                None if case.decode.root != DecodeRoot::Acquire => &NULL,
                None => {
                    return Err(DecodeError::new(
                        DecodeErrorKind::MissingKey {
                            key: content.key.name.clone(),
                        },
                        parent.path,
                    ));
                }
            };
            let fields = Decoder::new(hooks).run_plan(&case.decode, payload, path)?;
            Ok(EnumValue::with_fields(&case.name, fields))
        }
        TaggingPlan::Untagged { order } => {
            for case in order.iter().filter_map(|&index| plan.cases.get(index)) {
                // every attempt starts from scratch, so a failed case leaves nothing behind
                match Decoder::new(hooks).run_plan(&case.decode, document, KeyPath::default()) {
                    Ok(fields) => return Ok(EnumValue::with_fields(&case.name, fields)),
                    Err(err) => {
                        debug!(case = %case.name, error = %err, "untagged case rejected");
                    }
                }
            }
            Err(DecodeError::at_root(DecodeErrorKind::Failed(
                Failure::NoCaseMatched,
            )))
        }
    }
}

fn decode_external(
    plan: &EnumPlan,
    document: &Value,
    hooks: &Hooks,
) -> Result<EnumValue, DecodeError> {
    let object = document.as_object().ok_or_else(|| {
        DecodeError::at_root(DecodeErrorKind::NotAContainer {
            key: None,
            found: json_kind(document),
        })
    })?;

    let mut entries = object.iter();
    let (key, payload) = match (entries.next(), entries.next()) {
        (Some(entry), None) => entry,
        (None, _) => {
            return Err(DecodeError::at_root(DecodeErrorKind::Failed(
                Failure::MissingDiscriminant,
            )));
        }
        (Some(_), Some(_)) => {
            return Err(DecodeError::at_root(DecodeErrorKind::Failed(
                Failure::AmbiguousDiscriminant,
            )));
        }
    };

    let case = plan
        .cases
        .iter()
        .position(|case| {
            case.key.as_ref().is_some_and(|k| &k.name == key)
                || case.tags.iter().any(|tag| tag.as_str() == Some(key.as_str()))
        })
        .or(plan.unknown_case)
        .and_then(|index| plan.cases.get(index))
        .ok_or_else(|| {
            DecodeError::at_root(DecodeErrorKind::Failed(Failure::UnknownDiscriminant))
        })?;
    trace!(case = %case.name, "external discriminant matched");

    let fields = Decoder::new(hooks).run_plan(&case.decode, payload, KeyPath(vec![key.clone()]))?;
    Ok(EnumValue::with_fields(&case.name, fields))
}

/// A container bound to a name in the plan.
#[derive(Debug, Clone)]
struct Bound<'v> {
    value: &'v Value,
    path: KeyPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Return,
}

enum Lookup<'v> {
    Found(Bound<'v>),
    Missing,
    Invalid(&'static str),
}

struct Decoder<'h, 'v> {
    hooks: &'h Hooks,
    bindings: HashMap<String, Bound<'v>>,
    record: Record,
}

impl<'h, 'v> Decoder<'h, 'v> {
    fn new(hooks: &'h Hooks) -> Self {
        Self {
            hooks,
            bindings: HashMap::new(),
            record: Record::new(),
        }
    }

    fn run_plan(
        mut self,
        plan: &DecodePlan,
        document: &'v Value,
        path: KeyPath,
    ) -> Result<Record, DecodeError> {
        self.run(&plan.initializers)?;

        let container = &plan.body.container;
        match plan.root {
            DecodeRoot::Acquire => {
                if !document.is_object() {
                    return Err(DecodeError::new(
                        DecodeErrorKind::NotAContainer {
                            key: None,
                            found: json_kind(document),
                        },
                        path,
                    ));
                }
                self.bind(container, document, path);
            }
            DecodeRoot::Shared => {
                self.bound(container)?;
            }
            DecodeRoot::Skip => self.bind(container, document, path),
        }

        if self.container(&plan.body)? == Flow::Return {
            trace!("decoding stopped early");
        }

        if let Some(field) = plan
            .required
            .iter()
            .find(|field| !self.record.contains_key(*field))
        {
            return Err(DecodeError::at_root(DecodeErrorKind::MissingField {
                field: field.clone(),
            }));
        }
        Ok(self.record)
    }

    fn bind(&mut self, container: &str, value: &'v Value, path: KeyPath) {
        self.bindings
            .insert(container.to_string(), Bound { value, path });
    }

    fn bound(&self, container: &str) -> Result<&Bound<'v>, DecodeError> {
        self.bindings.get(container).ok_or_else(|| {
            DecodeError::at_root(DecodeErrorKind::UnboundContainer(container.to_string()))
        })
    }

    fn nested(&self, parent: &str, key: &str) -> Result<Lookup<'v>, DecodeError> {
        let bound = self.bound(parent)?;
        let value: &'v Value = bound.value;
        let object = value.as_object().ok_or_else(|| {
            DecodeError::new(
                DecodeErrorKind::NotAContainer {
                    key: None,
                    found: json_kind(value),
                },
                bound.path.clone(),
            )
        })?;
        Ok(match object.get(key) {
            None => Lookup::Missing,
            Some(child) if child.is_object() => Lookup::Found(Bound {
                value: child,
                path: bound.path.child(key),
            }),
            Some(child) => Lookup::Invalid(json_kind(child)),
        })
    }

    fn path_of(&self, container: &str) -> KeyPath {
        self.bindings
            .get(container)
            .map(|bound| bound.path.clone())
            .unwrap_or_default()
    }

    fn acquire(&mut self, acquisition: &Acquisition) -> Result<(), DecodeError> {
        match self.nested(&acquisition.parent, &acquisition.key.name)? {
            Lookup::Found(bound) => {
                self.bindings.insert(acquisition.container.clone(), bound);
                Ok(())
            }
            Lookup::Missing => Err(DecodeError::new(
                DecodeErrorKind::MissingKey {
                    key: acquisition.key.name.clone(),
                },
                self.path_of(&acquisition.parent),
            )),
            Lookup::Invalid(found) => Err(DecodeError::new(
                DecodeErrorKind::NotAContainer {
                    key: Some(acquisition.key.name.clone()),
                    found,
                },
                self.path_of(&acquisition.parent),
            )),
        }
    }

    /// Bind the top-level container and every container on the way to the
    /// tag, then pick the case the tag selects.
    fn read_tag<'p>(
        &mut self,
        plan: &'p EnumPlan,
        tag: &TagAccess,
        document: &'v Value,
    ) -> Result<&'p CasePlan, DecodeError> {
        if !document.is_object() {
            return Err(DecodeError::at_root(DecodeErrorKind::NotAContainer {
                key: None,
                found: json_kind(document),
            }));
        }
        self.bind(&tag.root, document, KeyPath::default());

        for acquisition in &tag.setup {
            match self.nested(&acquisition.parent, &acquisition.key.name)? {
                Lookup::Found(bound) => {
                    self.bindings.insert(acquisition.container.clone(), bound);
                }
                Lookup::Missing => {
                    return Err(DecodeError::new(
                        DecodeErrorKind::Failed(Failure::MissingDiscriminant),
                        self.path_of(&acquisition.parent),
                    ));
                }
                Lookup::Invalid(found) => {
                    return Err(DecodeError::new(
                        DecodeErrorKind::NotAContainer {
                            key: Some(acquisition.key.name.clone()),
                            found,
                        },
                        self.path_of(&acquisition.parent),
                    ));
                }
            }
        }

        let holder = self.bound(&tag.container)?;
        let raw = holder
            .value
            .as_object()
            .and_then(|object| object.get(&tag.key.name))
            .ok_or_else(|| {
                DecodeError::new(
                    DecodeErrorKind::Failed(Failure::MissingDiscriminant),
                    holder.path.clone(),
                )
            })?;

        let found = tag_from_json(tag.kind, raw);
        let index = found
            .as_ref()
            .and_then(|value| plan.cases.iter().position(|case| case.tags.contains(value)));
        if index.is_none() {
            debug!(tag = %raw, "discriminant matched no case");
        }
        index
            .or(plan.unknown_case)
            .and_then(|index| plan.cases.get(index))
            .ok_or_else(|| {
                DecodeError::new(
                    DecodeErrorKind::Failed(Failure::UnknownDiscriminant),
                    holder.path.clone(),
                )
            })
    }

    fn container(&mut self, body: &DecodeContainer) -> Result<Flow, DecodeError> {
        for acquisition in &body.setup {
            self.acquire(acquisition)?;
        }
        if self.run(&body.statements)? == Flow::Return {
            return Ok(Flow::Return);
        }

        for branch in &body.branches {
            if branch.acquisition == BranchAcquisition::Guarded {
                let parent_path = self.path_of(&branch.parent);
                let recovery = match self.nested(&branch.parent, &branch.key.name)? {
                    Lookup::Found(bound) => {
                        self.bindings.insert(branch.container.clone(), bound);
                        None
                    }
                    Lookup::Missing => Some(branch.fallback.on_missing().ok_or_else(|| {
                        DecodeError::new(
                            DecodeErrorKind::MissingKey {
                                key: branch.key.name.clone(),
                            },
                            parent_path.clone(),
                        )
                    })?),
                    Lookup::Invalid(found) => {
                        Some(branch.fallback.on_invalid().ok_or_else(|| {
                            DecodeError::new(
                                DecodeErrorKind::NotAContainer {
                                    key: Some(branch.key.name.clone()),
                                    found,
                                },
                                parent_path.clone(),
                            )
                        })?)
                    }
                };
                if let Some(recovery) = recovery {
                    debug!(container = %branch.container, "container unavailable, recovering");
                    if self.run(recovery)? == Flow::Return {
                        return Ok(Flow::Return);
                    }
                    continue;
                }
            } else {
                self.bound(&branch.container)?;
            }

            if self.container(&branch.body)? == Flow::Return {
                return Ok(Flow::Return);
            }
        }

        self.run(&body.deferred)
    }

    fn run(&mut self, statements: &[Statement]) -> Result<Flow, DecodeError> {
        for statement in statements {
            if self.step(statement)? == Flow::Return {
                return Ok(Flow::Return);
            }
        }
        Ok(Flow::Continue)
    }

    fn step(&mut self, statement: &Statement) -> Result<Flow, DecodeError> {
        match statement {
            Statement::Decode(read) => return self.read(read),
            Statement::AssignDefault { field, value } => {
                let parsed = serde_json::from_str(&value.0).map_err(|_| {
                    DecodeError::at_root(DecodeErrorKind::InvalidDefault {
                        field: field.clone(),
                        expr: value.0.clone(),
                    })
                })?;
                self.record.insert(field.clone(), parsed);
            }
            Statement::AssignNone { field } => {
                self.record.insert(field.clone(), Value::Null);
            }
            Statement::Conditional {
                predicate,
                then,
                otherwise,
            } => {
                let check = self.hooks.decode_predicate(&predicate.0).ok_or_else(|| {
                    DecodeError::at_root(DecodeErrorKind::UnknownPredicate(predicate.0.clone()))
                })?;
                let holds = check(&self.record);
                trace!(predicate = %predicate, holds, "condition evaluated");
                return self.run(if holds { then } else { otherwise });
            }
            Statement::Throw(failure) => {
                return Err(DecodeError::at_root(DecodeErrorKind::Failed(
                    failure.clone(),
                )));
            }
            Statement::Return => return Ok(Flow::Return),
            Statement::Encode(_) | Statement::EncodeTag(_) => {}
        }
        Ok(Flow::Continue)
    }

    fn read(&mut self, read: &FieldDecode) -> Result<Flow, DecodeError> {
        let bound = self.bound(&read.container)?.clone();
        let raw: &'v Value = match &read.key {
            None => bound.value,
            Some(key) => {
                let object = bound.value.as_object().ok_or_else(|| {
                    DecodeError::new(
                        DecodeErrorKind::NotAContainer {
                            key: None,
                            found: json_kind(bound.value),
                        },
                        bound.path.clone(),
                    )
                })?;
                match object.get(&key.name) {
                    Some(raw) => raw,
                    None => {
                        trace!(field = %read.field, key = %key.name, "key missing");
                        return match read.fallback.on_missing() {
                            Some(recovery) => self.run(recovery),
                            None => Err(DecodeError::new(
                                DecodeErrorKind::MissingKey {
                                    key: key.name.clone(),
                                },
                                bound.path,
                            )),
                        };
                    }
                }
            }
        };

        let converter = match &read.converter {
            Some(name) => Some(self.hooks.converter(&name.0).ok_or_else(|| {
                DecodeError::at_root(DecodeErrorKind::UnknownConverter(name.0.clone()))
            })?),
            None => None,
        };

        let decoded = if raw.is_null() && read.ty.optional {
            Ok(Value::Null)
        } else {
            let converted = match (converter, &read.converter) {
                (Some(converter), Some(name)) => {
                    converter
                        .decode(raw)
                        .map_err(|message| DecodeErrorKind::Converter {
                            field: read.field.clone(),
                            converter: name.0.clone(),
                            message,
                        })
                }
                _ => Ok(raw.clone()),
            };
            converted.and_then(|value| {
                if conforms(&read.ty, &value) {
                    Ok(value)
                } else {
                    Err(DecodeErrorKind::TypeMismatch {
                        field: read.field.clone(),
                        expected: read.ty.clone(),
                        found: json_kind(&value),
                    })
                }
            })
        };

        match decoded {
            Ok(value) => {
                self.record.insert(read.field.clone(), value);
                Ok(Flow::Continue)
            }
            Err(kind) => match read.fallback.on_invalid() {
                Some(recovery) => {
                    trace!(field = %read.field, error = %kind, "invalid value, recovering");
                    self.run(recovery)
                }
                None => Err(DecodeError::new(kind, bound.path)),
            },
        }
    }
}
