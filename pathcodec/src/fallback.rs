//! What generated code does when a value or container cannot be obtained.

use core::ops::Add;

use serde::{Deserialize, Serialize};

use crate::plan::Statement;

/// Failure-handling mode for one key or nested container.
///
/// Policies attach to the incoming edge of a trie node: they govern what
/// happens when the container for reaching that node cannot be acquired.
/// Several fields sharing one edge each contribute a policy; the edge uses
/// their combination (see [`FallbackPolicy::combine`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallbackPolicy {
    /// Propagate the failure.
    Throw,
    /// Run the statements when the container is missing; fail when it is invalid.
    OnlyIfMissing(Vec<Statement>),
    /// Recover from both a missing and an invalid container.
    IfMissingOrInvalid {
        /// Run when the container is missing
        missing: Vec<Statement>,
        /// Run when the container is present but not a keyed container
        invalid: Vec<Statement>,
    },
}

impl FallbackPolicy {
    /// Combine two policies met on the same edge.
    ///
    /// `Throw` absorbs everything. Recovering from an invalid container only
    /// survives when both sides recover from it. Statement lists are
    /// concatenated left to right, unless the left list already contains a
    /// terminal statement, in which case the right list is unreachable and
    /// dropped.
    ///
    /// The operation is associative. It is not commutative: recovery
    /// statements may touch shared state, so only left-to-right order is
    /// guaranteed.
    pub fn combine(self, other: FallbackPolicy) -> FallbackPolicy {
        use FallbackPolicy::*;
        match (self, other) {
            (Throw, _) | (_, Throw) => Throw,
            (OnlyIfMissing(left), OnlyIfMissing(right))
            | (OnlyIfMissing(left), IfMissingOrInvalid { missing: right, .. })
            | (IfMissingOrInvalid { missing: left, .. }, OnlyIfMissing(right)) => {
                OnlyIfMissing(concat(left, right))
            }
            (
                IfMissingOrInvalid {
                    missing: left_missing,
                    invalid: left_invalid,
                },
                IfMissingOrInvalid {
                    missing: right_missing,
                    invalid: right_invalid,
                },
            ) => IfMissingOrInvalid {
                missing: concat(left_missing, right_missing),
                invalid: concat(left_invalid, right_invalid),
            },
        }
    }

    /// Combine every policy in order; no policy at all means `Throw`.
    pub fn resolve<I>(policies: I) -> FallbackPolicy
    where
        I: IntoIterator<Item = FallbackPolicy>,
    {
        policies
            .into_iter()
            .reduce(FallbackPolicy::combine)
            .unwrap_or(FallbackPolicy::Throw)
    }

    /// Whether failures propagate.
    pub fn is_throw(&self) -> bool {
        matches!(self, FallbackPolicy::Throw)
    }

    /// Recovery for a missing container, if any.
    pub fn on_missing(&self) -> Option<&[Statement]> {
        match self {
            FallbackPolicy::Throw => None,
            FallbackPolicy::OnlyIfMissing(statements) => Some(statements),
            FallbackPolicy::IfMissingOrInvalid { missing, .. } => Some(missing),
        }
    }

    /// Recovery for an invalid container, if any.
    pub fn on_invalid(&self) -> Option<&[Statement]> {
        match self {
            FallbackPolicy::IfMissingOrInvalid { invalid, .. } => Some(invalid),
            _ => None,
        }
    }
}

impl Add for FallbackPolicy {
    type Output = FallbackPolicy;

    fn add(self, rhs: FallbackPolicy) -> FallbackPolicy {
        self.combine(rhs)
    }
}

fn concat(mut left: Vec<Statement>, right: Vec<Statement>) -> Vec<Statement> {
    if !left.iter().any(Statement::is_terminal) {
        left.extend(right);
    }
    left
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::DefaultExpr;
    use crate::plan::Failure;

    fn assign(field: &str) -> Statement {
        Statement::AssignDefault {
            field: field.into(),
            value: DefaultExpr::new("0"),
        }
    }

    fn missing(fields: &[&str]) -> FallbackPolicy {
        FallbackPolicy::OnlyIfMissing(fields.iter().map(|f| assign(f)).collect())
    }

    fn lenient(fields: &[&str]) -> FallbackPolicy {
        FallbackPolicy::IfMissingOrInvalid {
            missing: fields.iter().map(|f| assign(f)).collect(),
            invalid: fields.iter().map(|f| assign(f)).collect(),
        }
    }

    #[test]
    fn throw_absorbs() {
        assert!((missing(&["a"]) + FallbackPolicy::Throw).is_throw());
        assert!((FallbackPolicy::Throw + lenient(&["a"])).is_throw());
    }

    #[test]
    fn missing_concatenates_in_order() {
        assert_eq!(missing(&["a"]) + missing(&["b"]), missing(&["a", "b"]));
    }

    #[test]
    fn mixed_policies_lose_invalid_recovery() {
        assert_eq!(missing(&["a"]) + lenient(&["b"]), missing(&["a", "b"]));
        assert_eq!(lenient(&["a"]) + missing(&["b"]), missing(&["a", "b"]));
        assert_eq!(lenient(&["a"]) + lenient(&["b"]), lenient(&["a", "b"]));
    }

    #[test]
    fn terminal_statement_drops_rest() {
        let stop = FallbackPolicy::OnlyIfMissing(vec![
            assign("a"),
            Statement::Throw(Failure::Custom("gone".into())),
        ]);
        assert_eq!(stop.clone() + missing(&["b"]), stop);
    }

    #[test]
    fn resolve_of_nothing_throws() {
        assert!(FallbackPolicy::resolve(Vec::new()).is_throw());
        assert_eq!(
            FallbackPolicy::resolve(vec![missing(&["c"])]),
            missing(&["c"])
        );
    }

    #[test]
    fn combine_is_associative() {
        let terminal = FallbackPolicy::OnlyIfMissing(vec![Statement::Return]);
        let samples = [
            FallbackPolicy::Throw,
            missing(&["a"]),
            lenient(&["b"]),
            terminal,
            lenient(&["c", "d"]),
        ];
        for a in &samples {
            for b in &samples {
                for c in &samples {
                    let left = (a.clone() + b.clone()) + c.clone();
                    let right = a.clone() + (b.clone() + c.clone());
                    assert_eq!(left, right, "({a:?} + {b:?}) + {c:?}");
                }
            }
        }
    }
}
