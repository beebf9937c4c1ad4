//! Encode planning: the mirror of decoding, without fallbacks or ordering.

use indextree::NodeId;

use crate::key::{ContainerNamer, KeyId, KeyNameAllocator, KeyRef};
use crate::plan::{
    EncodeBranch, EncodeContainer, EncodePlan, EncodeRoot, FieldEncode, Mutability, Statement,
    TagWrite,
};
use crate::tagging::TagValue;
use crate::trie::{PathTrie, SlotKind};
use crate::{debug, trace};

pub(crate) struct EncodePlanner<'a> {
    trie: &'a PathTrie,
    keys: &'a mut KeyNameAllocator,
    names: &'a mut ContainerNamer,
    tag: Option<TagValue>,
}

impl<'a> EncodePlanner<'a> {
    pub(crate) fn new(
        trie: &'a PathTrie,
        keys: &'a mut KeyNameAllocator,
        names: &'a mut ContainerNamer,
    ) -> Self {
        Self {
            trie,
            keys,
            names,
            tag: None,
        }
    }

    /// Discriminant written into the trie's tag slot.
    pub(crate) fn with_tag(mut self, tag: TagValue) -> Self {
        self.tag = Some(tag);
        self
    }

    /// Plan the whole trie. `force_root` creates the top-level container
    /// even when nothing is written into it by key.
    pub(crate) fn plan(mut self, root_container: &str, force_root: bool) -> EncodePlan {
        let trie = self.trie;
        let root = trie.root();
        let body = self.plan_node(root, root_container);

        let keyed_at_root = trie.node(root).slots.iter().any(|slot| {
            slot.key.is_some()
                && match slot.kind {
                    SlotKind::Field(index) => trie.field(index).is_encoded(),
                    SlotKind::Tag => true,
                }
        });
        let root_access = if keyed_at_root || force_root || !body.branches.is_empty() {
            EncodeRoot::Create(mutability(trie, root))
        } else {
            EncodeRoot::Skip
        };

        debug!(
            containers = body.container_count(),
            ?root_access,
            "planned encode"
        );
        EncodePlan {
            root: root_access,
            body,
        }
    }

    fn key_ref(&mut self, key: KeyId) -> KeyRef {
        self.keys
            .resolve(key)
            .expect("trie keys come from the planner's allocator")
    }

    fn plan_node(&mut self, node: NodeId, container: &str) -> EncodeContainer {
        let trie = self.trie;
        let mut plan = EncodeContainer::new(container);

        for slot in &trie.node(node).slots {
            match slot.kind {
                SlotKind::Field(index) => {
                    let field = trie.field(index);
                    if !field.is_encoded() {
                        continue;
                    }
                    let key = slot.key.map(|key| self.key_ref(key));
                    let encode = Statement::Encode(FieldEncode {
                        field: field.name.clone(),
                        container: container.to_string(),
                        key,
                        ty: field.ty.clone(),
                        converter: field.converter.clone(),
                    });
                    plan.statements.push(match &field.skip_encoding_if {
                        Some(predicate) => Statement::Conditional {
                            predicate: predicate.clone(),
                            then: Vec::new(),
                            otherwise: vec![encode],
                        },
                        None => encode,
                    });
                }
                SlotKind::Tag => {
                    if let (Some(value), Some(key)) = (self.tag.clone(), slot.key) {
                        plan.statements.push(Statement::EncodeTag(TagWrite {
                            container: container.to_string(),
                            key: self.key_ref(key),
                            value,
                        }));
                    }
                }
            }
        }

        let children: Vec<NodeId> = trie
            .children(node)
            .filter(|&child| trie.has_encodable(child))
            .collect();
        for child in children {
            let key = trie
                .node(child)
                .key
                .expect("only the root node has no key");
            let key = self.key_ref(key);
            let name = self.names.container_for(&key.ident);
            let mutability = mutability(trie, child);
            trace!(container = %name, ?mutability, "nested encode container");
            let body = self.plan_node(child, &name);
            plan.branches.push(EncodeBranch {
                container: name,
                parent: container.to_string(),
                key,
                mutability,
                body,
            });
        }

        plan
    }
}

fn mutability(trie: &PathTrie, node: NodeId) -> Mutability {
    if trie.encodes_unconditionally(node) {
        Mutability::Immutable
    } else {
        Mutability::Mutable
    }
}
