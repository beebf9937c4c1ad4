//! Decode planning: a recursive walk of the trie that decides container
//! acquisition, fallback guarding and the order of field reads.

use std::collections::BTreeSet;

use indextree::NodeId;

use crate::dependency::{DependencyGraph, DependencyOrderer, fixed_point};
use crate::error::PlanError;
use crate::fallback::FallbackPolicy;
use crate::key::{ContainerNamer, KeyId, KeyNameAllocator, KeyRef};
use crate::plan::{
    Acquisition, BranchAcquisition, DecodeBranch, DecodeContainer, DecodePlan, DecodeRoot,
    FieldDecode, Statement,
};
use crate::trie::{PathTrie, SlotKind};
use crate::{debug, trace};

/// Plans the decoding of one trie.
pub(crate) struct DecodePlanner<'a> {
    trie: &'a PathTrie,
    graph: &'a DependencyGraph,
    keys: &'a mut KeyNameAllocator,
    names: &'a mut ContainerNamer,
    /// Fields whose value exists at the current point of the plan
    available: BTreeSet<usize>,
    /// Containers already bound, by key path from the root
    cache: Vec<(Vec<KeyId>, String)>,
}

impl<'a> DecodePlanner<'a> {
    pub(crate) fn new(
        trie: &'a PathTrie,
        graph: &'a DependencyGraph,
        keys: &'a mut KeyNameAllocator,
        names: &'a mut ContainerNamer,
    ) -> Self {
        Self {
            trie,
            graph,
            keys,
            names,
            available: BTreeSet::new(),
            cache: Vec::new(),
        }
    }

    /// Declare a container as already bound before the plan runs.
    pub(crate) fn with_cached(mut self, path: Vec<KeyId>, container: String) -> Self {
        self.cache.push((path, container));
        self
    }

    /// Plan the whole trie.
    ///
    /// `shared_root` means the top-level container is bound by the caller
    /// (an internally tagged enum read its tag from it).
    pub(crate) fn plan(
        mut self,
        root_container: &str,
        shared_root: bool,
    ) -> Result<DecodePlan, PlanError> {
        let trie = self.trie;
        let mut initializers = Vec::new();
        for (index, field) in trie.fields().iter().enumerate() {
            if !field.is_decoded() {
                initializers.extend(field.placeholder());
                self.available.insert(index);
            }
        }

        let root = trie.root();
        let body = self.plan_node(root, root_container, &[])?;

        let keyed_at_root = trie.node(root).slots.iter().any(|slot| match slot.kind {
            SlotKind::Field(index) => slot.key.is_some() && trie.field(index).is_decoded(),
            SlotKind::Tag => false,
        });
        let root_access = if shared_root {
            DecodeRoot::Shared
        } else if keyed_at_root || !body.setup.is_empty() || !body.branches.is_empty() {
            DecodeRoot::Acquire
        } else {
            DecodeRoot::Skip
        };

        let required = trie
            .fields()
            .iter()
            .filter(|field| field.is_required())
            .map(|field| field.name.clone())
            .collect();

        debug!(
            acquisitions = body.acquisition_count(),
            ?root_access,
            "planned decode"
        );
        Ok(DecodePlan {
            initializers,
            root: root_access,
            body,
            required,
        })
    }

    fn key_ref(&mut self, key: KeyId) -> KeyRef {
        self.keys
            .resolve(key)
            .expect("trie keys come from the planner's allocator")
    }

    fn plan_node(
        &mut self,
        node: NodeId,
        container: &str,
        path: &[KeyId],
    ) -> Result<DecodeContainer, PlanError> {
        let trie = self.trie;
        let orderer = DependencyOrderer::new(self.graph);
        let mut plan = DecodeContainer::new(container);

        let mut candidates: Vec<usize> = trie
            .node(node)
            .slots
            .iter()
            .filter_map(|slot| match slot.kind {
                SlotKind::Field(index) if trie.field(index).is_decoded() => Some(index),
                _ => None,
            })
            .collect();
        candidates.sort_unstable();

        let ordering = orderer.order(&candidates, &self.available);
        for field in ordering.ready {
            let statement = self.read(node, field, container);
            plan.statements.push(statement);
            self.available.insert(field);
        }

        for child in self.order_children(node)? {
            let key = trie
                .node(child)
                .key
                .expect("only the root node has no key");
            let mut child_path = path.to_vec();
            child_path.push(key);
            let key_ref = self.key_ref(key);

            let cached = self
                .cache
                .iter()
                .find(|(cached, _)| *cached == child_path)
                .map(|(_, name)| name.clone());

            let (name, acquisition, fallback) = match cached {
                Some(name) => (name, BranchAcquisition::Reused, FallbackPolicy::Throw),
                None => {
                    let name = self.names.container_for(&key_ref.ident);
                    let fallback = FallbackPolicy::resolve(
                        trie.subtree_fields(child)
                            .into_iter()
                            .map(|index| trie.field(index))
                            .filter(|field| field.is_decoded())
                            .filter_map(|field| field.container_fallback()),
                    );
                    if fallback.is_throw() {
                        plan.setup.push(Acquisition {
                            container: name.clone(),
                            parent: container.to_string(),
                            key: key_ref.clone(),
                        });
                        self.cache.push((child_path.clone(), name.clone()));
                        (name, BranchAcquisition::Hoisted, fallback)
                    } else {
                        (name, BranchAcquisition::Guarded, fallback)
                    }
                }
            };
            trace!(container = %name, ?acquisition, "nested decode container");

            let body = self.plan_node(child, &name, &child_path)?;
            plan.branches.push(DecodeBranch {
                container: name,
                parent: container.to_string(),
                key: key_ref,
                acquisition,
                fallback,
                body,
            });
        }

        let deferred = orderer.order(&ordering.pending, &self.available);
        if let Some(&field) = deferred.pending.first() {
            let dependency = orderer
                .missing_dependency(field, &self.available)
                .map(|dep| trie.field(dep).name.clone())
                .unwrap_or_default();
            return Err(PlanError::UnorderableDependency {
                field: trie.field(field).name.clone(),
                dependency,
            });
        }
        for field in deferred.ready {
            let statement = self.read(node, field, container);
            plan.deferred.push(statement);
            self.available.insert(field);
        }

        Ok(plan)
    }

    /// Children with something to decode, ordered so a subtree providing a
    /// dependency comes before the subtree needing it.
    fn order_children(&self, node: NodeId) -> Result<Vec<NodeId>, PlanError> {
        let trie = self.trie;
        let children: Vec<NodeId> = trie
            .children(node)
            .filter(|&child| trie.has_decodable(child))
            .collect();
        let owned: Vec<Vec<usize>> = children
            .iter()
            .map(|&child| {
                trie.subtree_fields(child)
                    .into_iter()
                    .filter(|&index| trie.field(index).is_decoded())
                    .collect()
            })
            .collect();
        let owner = |field: usize| owned.iter().position(|fields| fields.contains(&field));

        let blocking = |child: usize, placed: &[usize]| {
            owned[child].iter().find_map(|&field| {
                self.graph
                    .dependencies(field)
                    .iter()
                    .copied()
                    .find(|&dep| match owner(dep) {
                        Some(other) => other != child && !placed.contains(&other),
                        None => false,
                    })
                    .map(|dep| (field, dep))
            })
        };

        let indices: Vec<usize> = (0..children.len()).collect();
        let (ordered, stuck) = fixed_point(&indices, |child, placed| {
            blocking(child, placed).is_none()
        });

        if let Some(&child) = stuck.first() {
            let (field, dep) = blocking(child, ordered.as_slice())
                .expect("a stuck subtree is blocked by some dependency");
            return Err(PlanError::UnorderableDependency {
                field: trie.field(field).name.clone(),
                dependency: trie.field(dep).name.clone(),
            });
        }

        Ok(ordered.into_iter().map(|index| children[index]).collect())
    }

    fn read(&mut self, node: NodeId, field_index: usize, container: &str) -> Statement {
        let trie = self.trie;
        let field = trie.field(field_index);
        let key = trie
            .node(node)
            .slots
            .iter()
            .find(|slot| slot.kind == SlotKind::Field(field_index))
            .and_then(|slot| slot.key);
        let key = key.map(|key| self.key_ref(key));

        let decode = Statement::Decode(FieldDecode {
            field: field.name.clone(),
            container: container.to_string(),
            key,
            ty: field.ty.clone(),
            converter: field.converter.clone(),
            fallback: field.key_fallback(),
        });

        match &field.decode_when {
            Some(predicate) => Statement::Conditional {
                predicate: predicate.clone(),
                then: vec![decode],
                otherwise: field.placeholder(),
            },
            None => decode,
        }
    }
}
