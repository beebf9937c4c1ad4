//! Ordering of field reads so every field is decoded after the fields it
//! depends on.

use std::collections::BTreeSet;

use crate::error::PlanError;
use crate::field::FieldDescriptor;
use crate::trace;

/// Resolved `depends_on` edges of one declaration, by field index.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    deps: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Resolve every field's dependency names and reject cycles.
    pub fn build(fields: &[FieldDescriptor]) -> Result<Self, PlanError> {
        let mut deps = Vec::with_capacity(fields.len());
        for field in fields {
            let mut resolved = Vec::with_capacity(field.depends_on.len());
            for name in &field.depends_on {
                let Some(index) = fields.iter().position(|f| &f.name == name) else {
                    return Err(PlanError::UnknownDependency {
                        field: field.name.clone(),
                        dependency: name.clone(),
                        suggestion: suggest(name, fields),
                    });
                };
                if !resolved.contains(&index) {
                    resolved.push(index);
                }
            }
            deps.push(resolved);
        }

        let graph = Self { deps };
        graph.check_acyclic(fields)?;
        Ok(graph)
    }

    /// Fields `field` depends on.
    pub fn dependencies(&self, field: usize) -> &[usize] {
        self.deps.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    fn check_acyclic(&self, fields: &[FieldDescriptor]) -> Result<(), PlanError> {
        let all: Vec<usize> = (0..fields.len()).collect();
        let ordering = DependencyOrderer::new(self).order(&all, &BTreeSet::new());
        if ordering.pending.is_empty() {
            return Ok(());
        }

        // Whatever is left either sits on a cycle or depends on one. Peel off
        // fields nothing else in the leftover set depends on until only the
        // cycle itself remains.
        let mut stuck: BTreeSet<usize> = ordering.pending.into_iter().collect();
        loop {
            let peel: Vec<usize> = stuck
                .iter()
                .copied()
                .filter(|&candidate| {
                    !stuck
                        .iter()
                        .any(|&other| self.dependencies(other).contains(&candidate))
                })
                .collect();
            if peel.is_empty() {
                break;
            }
            for field in peel {
                stuck.remove(&field);
            }
        }

        Err(PlanError::DependencyCycle {
            fields: stuck.into_iter().map(|i| fields[i].name.clone()).collect(),
        })
    }
}

#[cfg(feature = "suggestions")]
fn suggest(name: &str, fields: &[FieldDescriptor]) -> Option<String> {
    fields
        .iter()
        .map(|f| (strsim::jaro_winkler(name, &f.name), &f.name))
        .filter(|(score, _)| *score > 0.8)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, candidate)| candidate.clone())
}

#[cfg(not(feature = "suggestions"))]
fn suggest(_name: &str, _fields: &[FieldDescriptor]) -> Option<String> {
    None
}

/// Result of ordering one group of fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ordering {
    /// Fields that can be emitted now, in emission order
    pub ready: Vec<usize>,
    /// Fields still waiting on a dependency, in declaration order
    pub pending: Vec<usize>,
}

/// Orders fields of one trie node against the set of already-decoded fields.
#[derive(Debug, Clone, Copy)]
pub struct DependencyOrderer<'g> {
    graph: &'g DependencyGraph,
}

impl<'g> DependencyOrderer<'g> {
    /// An orderer over the given graph.
    pub const fn new(graph: &'g DependencyGraph) -> Self {
        Self { graph }
    }

    /// Order `candidates` (given in declaration order).
    ///
    /// Fields whose dependencies are all in `available` come first, in
    /// declaration order. The rest are appended pass by pass as their
    /// dependencies get placed; whatever a full pass cannot place is
    /// pending.
    pub fn order(&self, candidates: &[usize], available: &BTreeSet<usize>) -> Ordering {
        let (ready, pending) = fixed_point(candidates, |field, placed| {
            self.graph
                .dependencies(field)
                .iter()
                .all(|dep| available.contains(dep) || placed.contains(dep))
        });
        if !pending.is_empty() {
            trace!(?ready, ?pending, "fields waiting on dependencies");
        }
        Ordering { ready, pending }
    }

    /// First dependency of `field` that is not in `available`.
    pub fn missing_dependency(&self, field: usize, available: &BTreeSet<usize>) -> Option<usize> {
        self.graph
            .dependencies(field)
            .iter()
            .copied()
            .find(|dep| !available.contains(dep))
    }
}

/// Stable fixed-point ordering shared by field and subtree ordering.
///
/// Items ready before anything is placed keep their relative order and go
/// first; then repeated passes append every item that became ready. An item
/// left over after a pass without progress is returned as pending.
pub(crate) fn fixed_point<T, F>(items: &[T], mut is_ready: F) -> (Vec<T>, Vec<T>)
where
    T: Copy + PartialEq,
    F: FnMut(T, &[T]) -> bool,
{
    let (mut placed, mut rest): (Vec<T>, Vec<T>) =
        items.iter().copied().partition(|&item| is_ready(item, &[]));

    loop {
        let before = rest.len();
        let mut waiting = Vec::with_capacity(rest.len());
        for item in rest {
            if is_ready(item, &placed) {
                placed.push(item);
            } else {
                waiting.push(item);
            }
        }
        rest = waiting;
        if rest.is_empty() || rest.len() == before {
            break;
        }
    }

    (placed, rest)
}
