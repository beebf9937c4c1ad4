//! Allocation of stable, collision-free identifiers for key path segments.
//!
//! Every distinct segment text gets exactly one [`KeyId`]. The identifier
//! behind an id may still change while fields are being registered (a
//! synthesized identifier is upgraded to a field name when one becomes
//! available), which is why the trie stores ids and resolves identifiers
//! only once planning starts.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::options::PlannerOptions;
use crate::trace;

/// Handle to one allocated key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyId(u32);

impl KeyId {
    /// Position of the key in allocation order.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A key as referenced by plan statements: its identifier and its encoded text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyRef {
    /// Identifier of the key in emitted code
    pub ident: String,
    /// Text of the key in the document
    pub name: String,
}

#[derive(Debug, Clone)]
struct KeyEntry {
    segment: String,
    ident: String,
    from_field: bool,
    used: bool,
}

/// Assigns identifiers to path segments for one key-set.
///
/// One allocator serves one declaration (or all cases of one enum); it is
/// never shared between declarations, so no counter outlives a planning call.
///
/// # Example
///
/// ```
/// use pathcodec::{KeyNameAllocator, PlannerOptions};
///
/// let mut keys = KeyNameAllocator::new(&PlannerOptions::default());
/// let meta = keys.allocate("meta-data", None);
/// let kind = keys.allocate("type", None);
/// assert_eq!(keys.ident(meta), "metaData");
/// assert_eq!(keys.ident(kind), "type1");
///
/// // the same segment is upgraded once a field claims it
/// let again = keys.allocate("type", Some("kind"));
/// assert_eq!(again, kind);
/// assert_eq!(keys.ident(kind), "kind");
/// ```
#[derive(Debug, Clone)]
pub struct KeyNameAllocator {
    entries: Vec<KeyEntry>,
    by_segment: IndexMap<String, KeyId>,
    taken: BTreeSet<String>,
    reserved: BTreeSet<String>,
}

impl KeyNameAllocator {
    /// An empty allocator honoring the options' reserved words.
    pub fn new(options: &PlannerOptions) -> Self {
        Self {
            entries: Vec::new(),
            by_segment: IndexMap::new(),
            taken: BTreeSet::new(),
            reserved: options.reserved_words.iter().cloned().collect(),
        }
    }

    /// Allocate (or look up) the key for `segment`.
    ///
    /// When `for_field` names the field whose value lives under this
    /// segment, the field name is preferred as identifier.
    pub fn allocate(&mut self, segment: &str, for_field: Option<&str>) -> KeyId {
        if let Some(&id) = self.by_segment.get(segment) {
            if let Some(name) = for_field {
                self.upgrade(id, name);
            }
            return id;
        }

        let (ident, from_field) = match for_field {
            Some(name) if !self.is_taken(name) => (name.to_string(), true),
            _ => (self.unique(&synthesize(segment)), false),
        };
        trace!(segment, ident = %ident, from_field, "allocated key");

        let id = KeyId(self.entries.len() as u32);
        self.taken.insert(ident.clone());
        self.entries.push(KeyEntry {
            segment: segment.to_string(),
            ident,
            from_field,
            used: false,
        });
        self.by_segment.insert(segment.to_string(), id);
        id
    }

    fn upgrade(&mut self, id: KeyId, name: &str) {
        let entry = &self.entries[id.index()];
        if entry.from_field || entry.ident == name || self.is_taken(name) {
            return;
        }
        let old = entry.ident.clone();
        trace!(segment = %entry.segment, from = %old, to = name, "upgraded key identifier");
        self.taken.remove(&old);
        self.taken.insert(name.to_string());
        let entry = &mut self.entries[id.index()];
        entry.ident = name.to_string();
        entry.from_field = true;
    }

    fn is_taken(&self, ident: &str) -> bool {
        self.taken.contains(ident) || self.reserved.contains(ident)
    }

    fn unique(&self, base: &str) -> String {
        if !self.is_taken(base) {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{base}{n}"))
            .find(|candidate| !self.is_taken(candidate))
            .unwrap_or_else(|| unreachable!("counter suffixes are unbounded"))
    }

    /// Mark a key as referenced by emitted output and return its reference.
    ///
    /// Returns `None` for an id this allocator never handed out.
    pub fn resolve(&mut self, id: KeyId) -> Option<KeyRef> {
        let entry = self.entries.get_mut(id.index())?;
        entry.used = true;
        Some(KeyRef {
            ident: entry.ident.clone(),
            name: entry.segment.clone(),
        })
    }

    /// Look up the id already allocated for `segment`.
    pub fn find(&self, segment: &str) -> Option<KeyId> {
        self.by_segment.get(segment).copied()
    }

    /// Current identifier of a key.
    pub fn ident(&self, id: KeyId) -> &str {
        &self.entries[id.index()].ident
    }

    /// Segment text of a key.
    pub fn segment(&self, id: KeyId) -> &str {
        &self.entries[id.index()].segment
    }

    /// Whether a key has been resolved into the output.
    pub fn is_used(&self, id: KeyId) -> bool {
        self.entries[id.index()].used
    }

    /// Number of allocated keys, used or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been allocated.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys that made it into the output, in allocation order.
    pub fn used_keys(&self) -> Vec<KeyRef> {
        self.entries
            .iter()
            .filter(|entry| entry.used)
            .map(|entry| KeyRef {
                ident: entry.ident.clone(),
                name: entry.segment.clone(),
            })
            .collect()
    }
}

/// Turn arbitrary segment text into an identifier.
///
/// Non-alphanumeric characters split words; words are joined in camel case
/// and a numeric start is prefixed with `key`.
pub fn synthesize(segment: &str) -> String {
    let mut ident = String::with_capacity(segment.len());
    for (index, word) in segment
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .enumerate()
    {
        let mut chars = word.chars();
        let Some(first) = chars.next() else { continue };
        if index == 0 {
            ident.extend(first.to_lowercase());
        } else {
            ident.extend(first.to_uppercase());
        }
        ident.push_str(chars.as_str());
    }

    if ident.is_empty() {
        return "key".to_string();
    }
    if ident.starts_with(|c: char| c.is_numeric()) {
        ident.insert_str(0, "key");
    }
    ident
}

/// Hands out unique binding names for containers within one plan.
#[derive(Debug, Clone)]
pub struct ContainerNamer {
    suffix: String,
    taken: BTreeSet<String>,
}

impl ContainerNamer {
    /// A namer that already reserves the root container's name.
    pub fn new(options: &PlannerOptions) -> Self {
        let mut taken = BTreeSet::new();
        taken.insert(options.root_container.clone());
        taken.extend(options.reserved_words.iter().cloned());
        Self {
            suffix: options.container_suffix.clone(),
            taken,
        }
    }

    /// Name for the container reached through the key identified by `ident`.
    pub fn container_for(&mut self, ident: &str) -> String {
        let base = format!("{ident}{}", self.suffix);
        let name = if self.taken.contains(&base) {
            (2..)
                .map(|n| format!("{base}{n}"))
                .find(|candidate| !self.taken.contains(candidate))
                .unwrap_or_else(|| unreachable!("counter suffixes are unbounded"))
        } else {
            base
        };
        self.taken.insert(name.clone());
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocator() -> KeyNameAllocator {
        KeyNameAllocator::new(&PlannerOptions::default())
    }

    #[test]
    fn synthesizes_camel_case() {
        assert_eq!(synthesize("content-type"), "contentType");
        assert_eq!(synthesize("Content_Type"), "contentType");
        assert_eq!(synthesize("2nd place"), "key2ndPlace");
        assert_eq!(synthesize("--"), "key");
        assert_eq!(synthesize("id"), "id");
    }

    #[test]
    fn field_name_preferred_for_new_segment() {
        let mut keys = allocator();
        let id = keys.allocate("identifier", Some("id"));
        assert_eq!(keys.ident(id), "id");
        assert_eq!(keys.segment(id), "identifier");
    }

    #[test]
    fn allocation_is_stable_for_same_field() {
        let mut keys = allocator();
        let first = keys.allocate("id", Some("user_id"));
        let second = keys.allocate("id", Some("user_id"));
        assert_eq!(first, second);
        assert_eq!(keys.ident(first), "user_id");
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn upgrade_skipped_when_name_taken() {
        let mut keys = allocator();
        let other = keys.allocate("name", Some("label"));
        let segment = keys.allocate("title", None);
        assert_eq!(keys.ident(segment), "title");

        keys.allocate("title", Some("label"));
        assert_eq!(keys.ident(segment), "title");
        assert_eq!(keys.ident(other), "label");
    }

    #[test]
    fn first_field_keeps_shared_key() {
        let mut keys = allocator();
        let id = keys.allocate("id", Some("b"));
        keys.allocate("id", Some("c"));
        assert_eq!(keys.ident(id), "b");
    }

    #[test]
    fn collisions_get_counter_suffix() {
        let mut keys = allocator();
        let a = keys.allocate("a-b", None);
        let b = keys.allocate("a_b", None);
        let c = keys.allocate("a b", None);
        assert_eq!(keys.ident(a), "aB");
        assert_eq!(keys.ident(b), "aB1");
        assert_eq!(keys.ident(c), "aB2");
    }

    #[test]
    fn reserved_words_avoided() {
        let mut keys = allocator();
        let id = keys.allocate("match", None);
        assert_eq!(keys.ident(id), "match1");

        let field = keys.allocate("kind", Some("type"));
        assert_eq!(keys.ident(field), "kind");
    }

    #[test]
    fn only_resolved_keys_are_materialized() {
        let mut keys = allocator();
        let a = keys.allocate("a", None);
        let _b = keys.allocate("b", None);
        let c = keys.allocate("c", None);
        assert_eq!(keys.find("c"), Some(c));
        assert_eq!(keys.find("d"), None);
        assert!(keys.resolve(c).is_some());
        assert!(keys.resolve(a).is_some());
        assert!(keys.is_used(a));
        assert!(!keys.is_used(keys.find("b").unwrap()));
        let used: Vec<_> = keys.used_keys().into_iter().map(|k| k.name).collect();
        assert_eq!(used, ["a", "c"]);
    }

    #[test]
    fn container_names_are_unique() {
        let mut names = ContainerNamer::new(&PlannerOptions::default());
        assert_eq!(names.container_for("meta"), "meta_container");
        assert_eq!(names.container_for("meta"), "meta_container2");
    }
}
