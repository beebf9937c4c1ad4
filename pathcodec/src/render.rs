//! Human-readable outlines of plans.
//!
//! The outline is what tests snapshot and what `Display` prints; emitters
//! should walk the plan types instead of parsing it.

use core::fmt;

use crate::fallback::FallbackPolicy;
use crate::key::KeyRef;
use crate::plan::{
    BranchAcquisition, DecodeContainer, DecodePlan, DecodeRoot, EncodeContainer, EncodePlan,
    EncodeRoot, EnumPlan, Failure, Mutability, Plan, Statement, StructPlan, TagAccess, TaggingPlan,
};
use crate::tagging::InternalContent;

/// Indented line writer over a formatter; lines are separated, not terminated.
struct Outline<'a, 'b> {
    f: &'a mut fmt::Formatter<'b>,
    depth: usize,
    started: bool,
}

impl<'a, 'b> Outline<'a, 'b> {
    fn new(f: &'a mut fmt::Formatter<'b>) -> Self {
        Self {
            f,
            depth: 0,
            started: false,
        }
    }

    fn line(&mut self, args: fmt::Arguments<'_>) -> fmt::Result {
        if self.started {
            self.f.write_str("\n")?;
        }
        self.started = true;
        for _ in 0..self.depth {
            self.f.write_str("  ")?;
        }
        self.f.write_fmt(args)
    }

    fn indented(&mut self, body: impl FnOnce(&mut Self) -> fmt::Result) -> fmt::Result {
        self.depth += 1;
        let result = body(self);
        self.depth -= 1;
        result
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::MissingDiscriminant => f.write_str("missing discriminant"),
            Failure::AmbiguousDiscriminant => f.write_str("ambiguous discriminant"),
            Failure::UnknownDiscriminant => f.write_str("unknown discriminant"),
            Failure::NoCaseMatched => f.write_str("no case matched"),
            Failure::Custom(message) => write!(f, "{message:?}"),
        }
    }
}

impl fmt::Display for FallbackPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackPolicy::Throw => f.write_str("throw"),
            FallbackPolicy::OnlyIfMissing(missing) => write!(f, "missing {}", inline(missing)),
            FallbackPolicy::IfMissingOrInvalid { missing, invalid } => {
                write!(f, "missing {} invalid {}", inline(missing), inline(invalid))
            }
        }
    }
}

fn inline(statements: &[Statement]) -> String {
    let parts: Vec<String> = statements.iter().map(one_line).collect();
    format!("{{{}}}", parts.join("; "))
}

fn slot(container: &str, key: Option<&KeyRef>) -> String {
    match key {
        Some(key) => format!("{container}[{:?}]", key.name),
        None => format!("flatten({container})"),
    }
}

fn one_line(statement: &Statement) -> String {
    match statement {
        Statement::Decode(decode) => {
            let mut line = format!(
                "{} = {} as {}",
                decode.field,
                slot(&decode.container, decode.key.as_ref()),
                decode.ty
            );
            if let Some(converter) = &decode.converter {
                line.push_str(&format!(" via {converter}"));
            }
            if !decode.fallback.is_throw() {
                line.push_str(&format!(" else {}", decode.fallback));
            }
            line
        }
        Statement::Encode(encode) => {
            let mut line = format!(
                "{} <- {} as {}",
                slot(&encode.container, encode.key.as_ref()),
                encode.field,
                encode.ty
            );
            if let Some(converter) = &encode.converter {
                line.push_str(&format!(" via {converter}"));
            }
            line
        }
        Statement::EncodeTag(tag) => format!(
            "{} <- tag {}",
            slot(&tag.container, Some(&tag.key)),
            tag.value
        ),
        Statement::AssignDefault { field, value } => format!("{field} = {value}"),
        Statement::AssignNone { field } => format!("{field} = none"),
        Statement::Conditional {
            predicate,
            then,
            otherwise,
        } => format!("if {predicate} {} else {}", inline(then), inline(otherwise)),
        Statement::Throw(failure) => format!("throw {failure}"),
        Statement::Return => "return".to_string(),
    }
}

fn statement(out: &mut Outline<'_, '_>, statement: &Statement) -> fmt::Result {
    match statement {
        Statement::Conditional {
            predicate,
            then,
            otherwise,
        } => {
            if then.is_empty() {
                out.line(format_args!("unless {predicate}:"))?;
                return out.indented(|out| statements(out, otherwise));
            }
            out.line(format_args!("if {predicate}:"))?;
            out.indented(|out| statements(out, then))?;
            if !otherwise.is_empty() {
                out.line(format_args!("else:"))?;
                out.indented(|out| statements(out, otherwise))?;
            }
            Ok(())
        }
        other => out.line(format_args!("{}", one_line(other))),
    }
}

fn statements(out: &mut Outline<'_, '_>, list: &[Statement]) -> fmt::Result {
    list.iter().try_for_each(|s| statement(out, s))
}

fn keys(out: &mut Outline<'_, '_>, keys: &[KeyRef]) -> fmt::Result {
    let list: Vec<String> = keys
        .iter()
        .map(|key| format!("{}={:?}", key.ident, key.name))
        .collect();
    out.line(format_args!("keys: {}", list.join(", ")))
}

fn decode_container(out: &mut Outline<'_, '_>, plan: &DecodeContainer) -> fmt::Result {
    for acquisition in &plan.setup {
        out.line(format_args!(
            "{} = {}.nested({:?})",
            acquisition.container, acquisition.parent, acquisition.key.name
        ))?;
    }
    statements(out, &plan.statements)?;
    for branch in &plan.branches {
        match branch.acquisition {
            BranchAcquisition::Hoisted => out.line(format_args!("in {}:", branch.container))?,
            BranchAcquisition::Reused => {
                out.line(format_args!("in {} (reused):", branch.container))?
            }
            BranchAcquisition::Guarded => out.line(format_args!(
                "try {} = {}.nested({:?}) else {}:",
                branch.container, branch.parent, branch.key.name, branch.fallback
            ))?,
        }
        out.indented(|out| decode_container(out, &branch.body))?;
    }
    if !plan.deferred.is_empty() {
        out.line(format_args!("deferred:"))?;
        out.indented(|out| statements(out, &plan.deferred))?;
    }
    Ok(())
}

fn decode_plan(out: &mut Outline<'_, '_>, plan: &DecodePlan) -> fmt::Result {
    statements(out, &plan.initializers)?;
    match plan.root {
        DecodeRoot::Acquire => out.line(format_args!("{} = decoder.keyed()", plan.body.container))?,
        DecodeRoot::Shared => out.line(format_args!("{} (shared)", plan.body.container))?,
        DecodeRoot::Skip => {}
    }
    decode_container(out, &plan.body)?;
    if !plan.required.is_empty() {
        out.line(format_args!("required: {}", plan.required.join(", ")))?;
    }
    Ok(())
}

fn binding(mutability: Mutability) -> &'static str {
    match mutability {
        Mutability::Immutable => "let",
        Mutability::Mutable => "var",
    }
}

fn encode_container(out: &mut Outline<'_, '_>, plan: &EncodeContainer) -> fmt::Result {
    statements(out, &plan.statements)?;
    for branch in &plan.branches {
        out.line(format_args!(
            "{} {} = {}.nested({:?}):",
            binding(branch.mutability),
            branch.container,
            branch.parent,
            branch.key.name
        ))?;
        out.indented(|out| encode_container(out, &branch.body))?;
    }
    Ok(())
}

fn encode_plan(out: &mut Outline<'_, '_>, plan: &EncodePlan) -> fmt::Result {
    if let EncodeRoot::Create(mutability) = plan.root {
        out.line(format_args!(
            "{} {} = encoder.keyed()",
            binding(mutability),
            plan.body.container
        ))?;
    }
    encode_container(out, &plan.body)
}

fn both(out: &mut Outline<'_, '_>, decode: &DecodePlan, encode: &EncodePlan) -> fmt::Result {
    out.line(format_args!("decode:"))?;
    out.indented(|out| decode_plan(out, decode))?;
    out.line(format_args!("encode:"))?;
    out.indented(|out| encode_plan(out, encode))
}

fn tag_access(out: &mut Outline<'_, '_>, tag: &TagAccess) -> fmt::Result {
    for acquisition in &tag.setup {
        out.line(format_args!(
            "{} = {}.nested({:?})",
            acquisition.container, acquisition.parent, acquisition.key.name
        ))?;
    }
    out.line(format_args!(
        "tag = {}[{:?}] as {}",
        tag.container, tag.key.name, tag.kind
    ))
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        statement(&mut Outline::new(f), self)
    }
}

impl fmt::Display for DecodePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        decode_plan(&mut Outline::new(f), self)
    }
}

impl fmt::Display for EncodePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        encode_plan(&mut Outline::new(f), self)
    }
}

impl fmt::Display for StructPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = Outline::new(f);
        out.line(format_args!("struct {}", self.name))?;
        keys(&mut out, &self.keys)?;
        both(&mut out, &self.decode, &self.encode)
    }
}

impl fmt::Display for EnumPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = Outline::new(f);
        out.line(format_args!("enum {}", self.name))?;
        keys(&mut out, &self.keys)?;
        match &self.tagging {
            TaggingPlan::External { container } => {
                out.line(format_args!("tagging: external ({container})"))?
            }
            TaggingPlan::Internal { tag, content } => {
                let content = match content {
                    InternalContent::Merged => "merged",
                    InternalContent::Whole => "whole",
                };
                out.line(format_args!("tagging: internal ({content})"))?;
                out.indented(|out| tag_access(out, tag))?;
            }
            TaggingPlan::Adjacent { tag, content } => {
                out.line(format_args!("tagging: adjacent"))?;
                out.indented(|out| {
                    tag_access(out, tag)?;
                    for acquisition in &content.setup {
                        out.line(format_args!(
                            "{} = {}.nested({:?})",
                            acquisition.container, acquisition.parent, acquisition.key.name
                        ))?;
                    }
                    out.line(format_args!(
                        "content = {}[{:?}]",
                        content.parent, content.key.name
                    ))
                })?;
            }
            TaggingPlan::Untagged { order } => {
                let order: Vec<&str> = order
                    .iter()
                    .filter_map(|&index| self.cases.get(index))
                    .map(|case| case.name.as_str())
                    .collect();
                out.line(format_args!("tagging: untagged [{}]", order.join(", ")))?;
            }
        }
        if let Some(case) = self.unknown_case.and_then(|index| self.cases.get(index)) {
            out.line(format_args!("unknown: {}", case.name))?;
        }
        for case in &self.cases {
            let tags: Vec<String> = case.tags.iter().map(ToString::to_string).collect();
            out.line(format_args!("case {} [{}]:", case.name, tags.join(", ")))?;
            out.indented(|out| both(out, &case.decode, &case.encode))?;
        }
        Ok(())
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plan::Struct(plan) => fmt::Display::fmt(plan, f),
            Plan::Enum(plan) => fmt::Display::fmt(plan, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{DefaultExpr, Predicate};

    #[test]
    fn conditional_outline() {
        let statement = Statement::Conditional {
            predicate: Predicate("has_extra".into()),
            then: vec![Statement::AssignNone {
                field: "extra".into(),
            }],
            otherwise: vec![Statement::Throw(Failure::Custom("nope".into()))],
        };
        assert_eq!(
            statement.to_string(),
            "if has_extra:\n  extra = none\nelse:\n  throw \"nope\""
        );
    }

    #[test]
    fn policy_outline() {
        let policy = FallbackPolicy::IfMissingOrInvalid {
            missing: vec![Statement::AssignDefault {
                field: "c".into(),
                value: DefaultExpr::new("0"),
            }],
            invalid: vec![Statement::Return],
        };
        assert_eq!(policy.to_string(), "missing {c = 0} invalid {return}");
        assert_eq!(FallbackPolicy::Throw.to_string(), "throw");
    }
}
