//! The registration tree: fields grouped by shared key-path prefixes.
//!
//! Every node stands for one keyed container. The root is the top-level
//! container; each child is the nested container found under the child's
//! key. A node's slots are the values read from (and written into) its
//! container, keyed by the last segment of their path.
//!
//! Nodes live in an [`indextree`] arena owned by the trie and refer to each
//! other by [`NodeId`], so planning can walk the tree recursively while the
//! allocator and contexts are borrowed mutably.

use indextree::{Arena, NodeId};

use crate::error::PlanError;
use crate::field::FieldDescriptor;
use crate::key::{KeyId, KeyNameAllocator};
use crate::trace;

/// What a slot codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// A declared field, by index
    Field(usize),
    /// The discriminant of an internally tagged enum case (encode only)
    Tag,
}

/// One value coded at a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// What is coded
    pub kind: SlotKind,
    /// Key inside the node's container; `None` codes the container's coder itself
    pub key: Option<KeyId>,
}

/// Data stored in each node of the trie.
#[derive(Debug, Clone, Default)]
pub struct TrieNode {
    /// Key leading to this node from its parent; `None` for the root
    pub key: Option<KeyId>,
    /// Values coded in this node's container, in emission preference order
    pub slots: Vec<Slot>,
}

/// The registration tree for one struct or one enum case.
///
/// # Example
///
/// ```
/// use pathcodec::{FieldDescriptor, KeyNameAllocator, PathTrie, PlannerOptions, TypeDescriptor};
///
/// let mut keys = KeyNameAllocator::new(&PlannerOptions::default());
/// let mut trie = PathTrie::new();
/// trie.register(FieldDescriptor::new("a", TypeDescriptor::integer()), &mut keys).unwrap();
/// trie.register(
///     FieldDescriptor::new("b", TypeDescriptor::integer()).coded_at(["meta", "id"]),
///     &mut keys,
/// )
/// .unwrap();
///
/// assert_eq!(trie.children(trie.root()).count(), 1);
/// assert_eq!(trie.node(trie.root()).slots.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct PathTrie {
    arena: Arena<TrieNode>,
    root: NodeId,
    fields: Vec<FieldDescriptor>,
}

impl Default for PathTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl PathTrie {
    /// A trie with only a root node.
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(TrieNode::default());
        Self {
            arena,
            root,
            fields: Vec::new(),
        }
    }

    /// Build a trie from fields in declaration order.
    pub fn build(
        fields: impl IntoIterator<Item = FieldDescriptor>,
        keys: &mut KeyNameAllocator,
    ) -> Result<Self, PlanError> {
        let mut trie = Self::new();
        for field in fields {
            trie.register(field, keys)?;
        }
        Ok(trie)
    }

    /// Register a field at its key path; returns the field's index.
    ///
    /// # Panics
    ///
    /// Panics when another encoded field already writes the same key of the
    /// same container: the caller handed over two fields with conflicting
    /// encode requirements, which is a contract violation rather than a
    /// configuration error.
    pub fn register(
        &mut self,
        field: FieldDescriptor,
        keys: &mut KeyNameAllocator,
    ) -> Result<usize, PlanError> {
        let path = field.key_path();
        let (containers, key_segment) = match path.split_last() {
            Some((last, init)) if !field.flatten => (init, Some(last)),
            _ => (path.as_slice(), None),
        };

        let node = self.descend(containers, keys, &field.name)?;

        let key = key_segment.map(|segment| keys.allocate(segment, Some(field.name.as_str())));
        if let Some(key) = key {
            if self.child(node, key).is_some() {
                return Err(PlanError::PathConflict {
                    field: field.name.clone(),
                    path: path.clone(),
                });
            }
            if field.is_encoded() {
                let clash = self.node(node).slots.iter().find_map(|slot| match slot.kind {
                    SlotKind::Field(other)
                        if slot.key == Some(key) && self.fields[other].is_encoded() =>
                    {
                        Some(self.fields[other].name.as_str())
                    }
                    _ => None,
                });
                assert!(
                    clash.is_none(),
                    "conflicting encode requirements: fields `{}` and `{}` both write key `{}`",
                    clash.unwrap_or_default(),
                    field.name,
                    keys.segment(key),
                );
            }
        }

        let index = self.fields.len();
        let slot = Slot {
            kind: SlotKind::Field(index),
            key,
        };

        // Keep a field ahead of the first sibling that depends on it.
        let fields = &self.fields;
        let slots = &mut self.arena[node].get_mut().slots;
        let position = slots.iter().position(|existing| match existing.kind {
            SlotKind::Field(other) => fields[other].depends_on.contains(&field.name),
            SlotKind::Tag => false,
        });
        match position {
            Some(position) => slots.insert(position, slot),
            None => slots.push(slot),
        }

        trace!(field = %field.name, ?path, "registered field");
        self.fields.push(field);
        Ok(index)
    }

    /// Register the discriminant of an internally tagged case at `path`.
    pub fn register_tag(
        &mut self,
        path: &[String],
        keys: &mut KeyNameAllocator,
    ) -> Result<(), PlanError> {
        let Some((last, containers)) = path.split_last() else {
            return Ok(());
        };
        let node = self.descend(containers, keys, "tag")?;
        let key = keys.allocate(last, None);
        let conflict = self.child(node, key).is_some()
            || self.node(node).slots.iter().any(|slot| {
                slot.key == Some(key)
                    && matches!(slot.kind, SlotKind::Field(i) if self.fields[i].is_encoded())
            });
        if conflict {
            return Err(PlanError::PathConflict {
                field: "tag".to_string(),
                path: path.to_vec(),
            });
        }
        self.arena[node].get_mut().slots.insert(
            0,
            Slot {
                kind: SlotKind::Tag,
                key: Some(key),
            },
        );
        Ok(())
    }

    fn descend(
        &mut self,
        containers: &[String],
        keys: &mut KeyNameAllocator,
        field: &str,
    ) -> Result<NodeId, PlanError> {
        let mut node = self.root;
        for (depth, segment) in containers.iter().enumerate() {
            let key = keys.allocate(segment, None);
            if self.node(node).slots.iter().any(|slot| slot.key == Some(key)) {
                return Err(PlanError::PathConflict {
                    field: field.to_string(),
                    path: containers[..=depth].to_vec(),
                });
            }
            node = match self.child(node, key) {
                Some(child) => child,
                None => {
                    let child = self.arena.new_node(TrieNode {
                        key: Some(key),
                        slots: Vec::new(),
                    });
                    node.append(child, &mut self.arena);
                    child
                }
            };
        }
        Ok(node)
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Data of a node.
    pub fn node(&self, id: NodeId) -> &TrieNode {
        self.arena[id].get()
    }

    /// Children of a node, in registration order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    /// Child of `id` reached through `key`.
    pub fn child(&self, id: NodeId, key: KeyId) -> Option<NodeId> {
        self.children(id).find(|&child| self.node(child).key == Some(key))
    }

    /// Registered fields, in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// A registered field.
    pub fn field(&self, index: usize) -> &FieldDescriptor {
        &self.fields[index]
    }

    /// Field indices in the subtree of `id`, own slots first, then children in order.
    pub fn subtree_fields(&self, id: NodeId) -> Vec<usize> {
        id.descendants(&self.arena)
            .flat_map(|node| self.node(node).slots.iter())
            .filter_map(|slot| match slot.kind {
                SlotKind::Field(index) => Some(index),
                SlotKind::Tag => None,
            })
            .collect()
    }

    /// Whether anything in the subtree of `id` is decoded.
    pub fn has_decodable(&self, id: NodeId) -> bool {
        self.subtree_fields(id)
            .into_iter()
            .any(|index| self.fields[index].is_decoded())
    }

    /// Whether anything in the subtree of `id` is encoded.
    pub fn has_encodable(&self, id: NodeId) -> bool {
        id.descendants(&self.arena).any(|node| {
            self.node(node).slots.iter().any(|slot| match slot.kind {
                SlotKind::Field(index) => self.fields[index].is_encoded(),
                SlotKind::Tag => true,
            })
        })
    }

    /// Whether every encoded value in the subtree of `id` is written unconditionally.
    pub fn encodes_unconditionally(&self, id: NodeId) -> bool {
        self.subtree_fields(id).into_iter().all(|index| {
            let field = &self.fields[index];
            !field.is_encoded() || !field.encodes_conditionally()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::TypeDescriptor;
    use crate::options::PlannerOptions;

    fn setup() -> (PathTrie, KeyNameAllocator) {
        (
            PathTrie::new(),
            KeyNameAllocator::new(&PlannerOptions::default()),
        )
    }

    fn int(name: &str) -> FieldDescriptor {
        FieldDescriptor::new(name, TypeDescriptor::integer())
    }

    #[test]
    fn shared_prefixes_share_nodes() {
        let (mut trie, mut keys) = setup();
        trie.register(int("b").coded_at(["meta", "id"]), &mut keys).unwrap();
        trie.register(int("c").coded_at(["meta", "kind"]), &mut keys).unwrap();
        trie.register(int("d").coded_at(["meta", "deep", "x"]), &mut keys).unwrap();

        let meta: Vec<_> = trie.children(trie.root()).collect();
        assert_eq!(meta.len(), 1);
        assert_eq!(trie.node(meta[0]).slots.len(), 2);
        assert_eq!(trie.children(meta[0]).count(), 1);
        assert_eq!(trie.subtree_fields(trie.root()), [0, 1, 2]);
    }

    #[test]
    fn key_then_container_conflicts() {
        let (mut trie, mut keys) = setup();
        trie.register(int("a").coded_at(["x"]), &mut keys).unwrap();
        let err = trie
            .register(int("b").coded_at(["x", "y"]), &mut keys)
            .unwrap_err();
        assert_eq!(
            err,
            PlanError::PathConflict {
                field: "b".into(),
                path: vec!["x".into()]
            }
        );
    }

    #[test]
    fn container_then_key_conflicts() {
        let (mut trie, mut keys) = setup();
        trie.register(int("b").coded_at(["x", "y"]), &mut keys).unwrap();
        let err = trie.register(int("a").coded_at(["x"]), &mut keys).unwrap_err();
        assert!(matches!(err, PlanError::PathConflict { .. }));
    }

    #[test]
    fn flattened_fields_live_at_their_container() {
        let (mut trie, mut keys) = setup();
        trie.register(int("a").coded_at(["x", "y"]), &mut keys).unwrap();
        trie.register(
            FieldDescriptor::new("rest", TypeDescriptor::any()).flattened(),
            &mut keys,
        )
        .unwrap();
        assert_eq!(trie.node(trie.root()).slots[0].key, None);
    }

    #[test]
    fn dependency_inserted_before_dependent() {
        let (mut trie, mut keys) = setup();
        trie.register(int("total").depends_on("price"), &mut keys).unwrap();
        trie.register(int("price"), &mut keys).unwrap();
        let order: Vec<_> = trie
            .node(trie.root())
            .slots
            .iter()
            .map(|slot| slot.kind)
            .collect();
        assert_eq!(order, [SlotKind::Field(1), SlotKind::Field(0)]);
    }

    #[test]
    fn decode_only_duplicates_allowed() {
        let (mut trie, mut keys) = setup();
        trie.register(int("a").coded_at(["id"]), &mut keys).unwrap();
        trie.register(int("b").coded_at(["id"]).ignore_encoding(), &mut keys)
            .unwrap();
        assert_eq!(trie.node(trie.root()).slots.len(), 2);
    }

    #[test]
    #[should_panic(expected = "conflicting encode requirements")]
    fn two_encoded_fields_on_one_key_panic() {
        let (mut trie, mut keys) = setup();
        trie.register(int("a").coded_at(["id"]), &mut keys).unwrap();
        let _ = trie.register(int("b").coded_at(["id"]), &mut keys);
    }

    #[test]
    fn write_only_subtrees_are_not_decodable() {
        let (mut trie, mut keys) = setup();
        trie.register(int("a").coded_at(["out", "a"]).ignore_decoding(), &mut keys)
            .unwrap();
        let out = trie.children(trie.root()).next().unwrap();
        assert!(!trie.has_decodable(out));
        assert!(trie.has_encodable(out));
    }

    #[test]
    fn tag_cannot_shadow_field() {
        let (mut trie, mut keys) = setup();
        trie.register(int("kind").coded_at(["type"]), &mut keys).unwrap();
        assert!(trie.register_tag(&["type".to_string()], &mut keys).is_err());
    }
}
