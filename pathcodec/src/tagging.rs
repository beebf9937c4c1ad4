//! Enum discriminant strategies and enum planning.
//!
//! An enum is planned as one trie per case. All cases share one key
//! allocator so every key identifier is unique across the enum, and the
//! discriminant (if any) wraps the per-case plans:
//!
//! - external: `{ "Circle": { ... } }`, the single top-level key picks the case
//! - internal: `{ "type": "circle", ... }`, the tag sits among the case fields
//! - adjacent: `{ "type": "circle", "content": { ... } }`
//! - untagged: cases are attempted in order

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::declaration::{EnumDeclaration, check_unique_names};
use crate::decode::DecodePlanner;
use crate::dependency::DependencyGraph;
use crate::encode::EncodePlanner;
use crate::error::PlanError;
use crate::field::FieldDescriptor;
use crate::key::{ContainerNamer, KeyId, KeyNameAllocator};
use crate::options::PlannerOptions;
use crate::plan::{Acquisition, CasePlan, ContentAccess, EnumPlan, TagAccess, TaggingPlan};
use crate::trie::PathTrie;
use crate::{debug, trace};

/// A discriminant value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagValue {
    /// A string tag
    Str(String),
    /// An integer tag
    Int(i64),
    /// A boolean tag
    Bool(bool),
}

impl TagValue {
    /// Kind of this value.
    pub fn kind(&self) -> TagKind {
        match self {
            TagValue::Str(_) => TagKind::Str,
            TagValue::Int(_) => TagKind::Int,
            TagValue::Bool(_) => TagKind::Bool,
        }
    }

    /// The string, for string tags.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Str(s) => write!(f, "{s:?}"),
            TagValue::Int(n) => write!(f, "{n}"),
            TagValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::Str(value.to_string())
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        TagValue::Str(value)
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        TagValue::Int(value)
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        TagValue::Bool(value)
    }
}

/// Kind of a discriminant value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagKind {
    /// String tags
    Str,
    /// Integer tags
    Int,
    /// Boolean tags
    Bool,
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TagKind::Str => "string",
            TagKind::Int => "integer",
            TagKind::Bool => "boolean",
        })
    }
}

/// One tagging customization attached to an enum declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaggingRequest {
    /// The discriminant lives at this key path
    TagAt(Vec<String>),
    /// The case payload lives at this key path (needs `TagAt`)
    ContentAt(Vec<String>),
    /// The case payload is decoded from the whole document (needs `TagAt`)
    WholeContent,
    /// There is no discriminant
    Untagged,
}

impl fmt::Display for TaggingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaggingRequest::TagAt(path) => write!(f, "tag at '{}'", path.join(".")),
            TaggingRequest::ContentAt(path) => write!(f, "content at '{}'", path.join(".")),
            TaggingRequest::WholeContent => f.write_str("whole-document content"),
            TaggingRequest::Untagged => f.write_str("untagged"),
        }
    }
}

/// Where an internally tagged case payload is decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InternalContent {
    /// Case fields are keys of the container holding the tag
    Merged,
    /// The single case field is decoded from the whole document
    Whole,
}

/// The discriminant strategy an enum's tagging requests resolve to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumTagging {
    /// The case name is the single key of the top-level container
    External,
    /// The tag sits at `tag_path` among the case fields
    Internal {
        /// Key path of the tag
        tag_path: Vec<String>,
        /// Where the payload comes from
        content: InternalContent,
    },
    /// Tag and payload sit at two paths
    Adjacent {
        /// Key path of the tag
        tag_path: Vec<String>,
        /// Key path of the payload
        content_path: Vec<String>,
    },
    /// No discriminant
    Untagged,
}

impl EnumTagging {
    /// Resolve the requests attached to one enum.
    ///
    /// Repeating a request verbatim is harmless. Requests of the same kind
    /// with different values, or requests that exclude each other, are a
    /// [`PlanError::ConflictingTagging`]; content without a tag path is a
    /// [`PlanError::IncompleteTagging`].
    ///
    /// ```
    /// use pathcodec::{EnumTagging, InternalContent, TaggingRequest};
    ///
    /// let tagging = EnumTagging::resolve(&[TaggingRequest::TagAt(vec!["type".into()])]).unwrap();
    /// assert_eq!(
    ///     tagging,
    ///     EnumTagging::Internal { tag_path: vec!["type".into()], content: InternalContent::Merged }
    /// );
    /// assert_eq!(EnumTagging::resolve(&[]).unwrap(), EnumTagging::External);
    /// ```
    pub fn resolve(requests: &[TaggingRequest]) -> Result<Self, PlanError> {
        let mut accepted: Vec<&TaggingRequest> = Vec::new();
        for request in requests {
            if accepted.contains(&request) {
                continue;
            }
            if let Some(first) = accepted.iter().find(|first| excludes(first, request)) {
                return Err(PlanError::ConflictingTagging {
                    first: (*first).clone(),
                    second: request.clone(),
                });
            }
            accepted.push(request);
        }

        let mut tag = None;
        let mut content = None;
        let mut whole = None;
        let mut untagged = false;
        for request in accepted {
            match request {
                TaggingRequest::TagAt(path) => tag = Some((request, path)),
                TaggingRequest::ContentAt(path) => content = Some((request, path)),
                TaggingRequest::WholeContent => whole = Some(request),
                TaggingRequest::Untagged => untagged = true,
            }
        }

        if untagged {
            return Ok(EnumTagging::Untagged);
        }
        let tag_path = match tag {
            Some((request, path)) if path.is_empty() => {
                return Err(PlanError::IncompleteTagging {
                    request: request.clone(),
                });
            }
            Some((_, path)) => path.clone(),
            None => {
                return match content.map(|(request, _)| request).or(whole) {
                    Some(request) => Err(PlanError::IncompleteTagging {
                        request: request.clone(),
                    }),
                    None => Ok(EnumTagging::External),
                };
            }
        };

        Ok(match (content, whole) {
            (Some((request, path)), _) if path.is_empty() => {
                return Err(PlanError::IncompleteTagging {
                    request: request.clone(),
                });
            }
            (Some((_, path)), _) => EnumTagging::Adjacent {
                tag_path,
                content_path: path.clone(),
            },
            (None, Some(_)) => EnumTagging::Internal {
                tag_path,
                content: InternalContent::Whole,
            },
            (None, None) => EnumTagging::Internal {
                tag_path,
                content: InternalContent::Merged,
            },
        })
    }
}

/// Whether `later` cannot be honored together with the accepted `earlier`.
fn excludes(earlier: &TaggingRequest, later: &TaggingRequest) -> bool {
    use TaggingRequest::*;
    match (earlier, later) {
        (TagAt(_), TagAt(_)) | (ContentAt(_), ContentAt(_)) => true,
        (Untagged, TagAt(_) | ContentAt(_) | WholeContent)
        | (TagAt(_) | ContentAt(_) | WholeContent, Untagged) => true,
        (ContentAt(_), WholeContent) | (WholeContent, ContentAt(_)) => true,
        _ => false,
    }
}

/// One case of an enum declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseDescriptor {
    /// Case name
    pub name: String,
    /// Declared discriminants; empty means the case name as a string
    pub tags: Vec<TagValue>,
    /// Associated fields, in declaration order
    pub fields: Vec<FieldDescriptor>,
}

impl CaseDescriptor {
    /// A case without fields or explicit tags.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Add a discriminant; the first one declared is the one written.
    pub fn tagged(mut self, tag: impl Into<TagValue>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Add an associated field.
    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Add several associated fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDescriptor>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Discriminants accepted for this case.
    pub fn effective_tags(&self) -> Vec<TagValue> {
        if self.tags.is_empty() {
            vec![TagValue::Str(self.name.clone())]
        } else {
            self.tags.clone()
        }
    }
}

/// Check tag kinds and uniqueness across the cases for `tagging`.
fn check_tags(tagging: &EnumTagging, cases: &[CaseDescriptor]) -> Result<(), PlanError> {
    if *tagging == EnumTagging::Untagged {
        return Ok(());
    }

    let mut seen: Vec<(TagValue, &str)> = Vec::new();
    let mut expected: Option<TagKind> = None;
    for case in cases {
        for tag in case.effective_tags() {
            match tagging {
                EnumTagging::External if tag.kind() != TagKind::Str => {
                    return Err(PlanError::NonStringExternalTag {
                        case: case.name.clone(),
                    });
                }
                EnumTagging::External => {}
                _ => match expected {
                    Some(expected) if expected != tag.kind() => {
                        return Err(PlanError::MixedTagKinds {
                            expected,
                            case: case.name.clone(),
                            found: tag.kind(),
                        });
                    }
                    Some(_) => {}
                    None => expected = Some(tag.kind()),
                },
            }
            if let Some((_, first)) = seen.iter().find(|(value, _)| *value == tag) {
                return Err(PlanError::DuplicateTag {
                    tag: tag.to_string(),
                    first: first.to_string(),
                    second: case.name.clone(),
                });
            }
            seen.push((tag, case.name.as_str()));
        }
    }
    Ok(())
}

fn allocate_path(keys: &mut KeyNameAllocator, path: &[String]) -> Vec<KeyId> {
    path.iter().map(|segment| keys.allocate(segment, None)).collect()
}

/// Tries of every case, registered against one shared allocator.
struct Registered {
    keys: KeyNameAllocator,
    tag_keys: Vec<KeyId>,
    content_keys: Vec<KeyId>,
    case_keys: Vec<Option<KeyId>>,
    tries: Vec<PathTrie>,
    graphs: Vec<DependencyGraph>,
}

fn register_cases(
    decl: &EnumDeclaration,
    tagging: &EnumTagging,
    options: &PlannerOptions,
) -> Result<Registered, PlanError> {
    let mut keys = KeyNameAllocator::new(options);
    let (tag_keys, content_keys) = match tagging {
        EnumTagging::Internal { tag_path, .. } => (allocate_path(&mut keys, tag_path), Vec::new()),
        EnumTagging::Adjacent {
            tag_path,
            content_path,
        } => {
            let tag = allocate_path(&mut keys, tag_path);
            (tag, allocate_path(&mut keys, content_path))
        }
        _ => (Vec::new(), Vec::new()),
    };

    let mut case_keys = Vec::with_capacity(decl.cases.len());
    let mut tries = Vec::with_capacity(decl.cases.len());
    let mut graphs = Vec::with_capacity(decl.cases.len());
    for case in &decl.cases {
        check_unique_names(&case.fields)?;

        let key = match tagging {
            EnumTagging::External => case
                .effective_tags()
                .first()
                .and_then(TagValue::as_str)
                .map(|tag| keys.allocate(tag, Some(case.name.as_str()))),
            _ => None,
        };
        case_keys.push(key);

        let fields: Vec<FieldDescriptor> = match tagging {
            EnumTagging::Internal {
                content: InternalContent::Whole,
                ..
            } => {
                if case.fields.len() > 1 {
                    return Err(PlanError::WholeContentArity {
                        case: case.name.clone(),
                        fields: case.fields.len(),
                    });
                }
                case.fields
                    .iter()
                    .map(|field| FieldDescriptor {
                        path: Vec::new(),
                        flatten: true,
                        ..field.clone()
                    })
                    .collect()
            }
            _ => case.fields.clone(),
        };

        graphs.push(DependencyGraph::build(&fields)?);
        let mut trie = PathTrie::new();
        if let EnumTagging::Internal { tag_path, .. } = tagging {
            trie.register_tag(tag_path, &mut keys)?;
        }
        for field in fields {
            trie.register(field, &mut keys)?;
        }
        trace!(case = %case.name, fields = trie.fields().len(), "registered case");
        tries.push(trie);
    }

    Ok(Registered {
        keys,
        tag_keys,
        content_keys,
        case_keys,
        tries,
        graphs,
    })
}

/// Acquisitions reaching the container that holds the last key of `path`.
///
/// Containers already acquired (listed in `bound`) are reused; new ones are
/// appended to `bound`. Returns the setup, the holding container and the
/// last key.
fn walk(
    path: &[KeyId],
    root: &str,
    keys: &mut KeyNameAllocator,
    names: &mut ContainerNamer,
    bound: &mut Vec<(Vec<KeyId>, String)>,
) -> (Vec<Acquisition>, String, KeyId) {
    let (last, containers) = path
        .split_last()
        .expect("tag and content paths are never empty");
    let mut setup = Vec::new();
    let mut parent = root.to_string();
    for depth in 0..containers.len() {
        let prefix = &containers[..=depth];
        if let Some((_, name)) = bound.iter().find(|(bound, _)| bound.as_slice() == prefix) {
            parent = name.clone();
            continue;
        }
        let key = keys
            .resolve(containers[depth])
            .expect("path keys come from the enum's allocator");
        let name = names.container_for(&key.ident);
        setup.push(Acquisition {
            container: name.clone(),
            parent: parent.clone(),
            key,
        });
        bound.push((prefix.to_vec(), name.clone()));
        parent = name;
    }
    (setup, parent, *last)
}

/// Plan an enum declaration.
pub(crate) fn plan_enum(
    decl: &EnumDeclaration,
    options: &PlannerOptions,
) -> Result<EnumPlan, PlanError> {
    debug!(name = %decl.name, cases = decl.cases.len(), "planning enum");
    let tagging = EnumTagging::resolve(&decl.tagging)?;
    check_tags(&tagging, &decl.cases)?;

    let unknown_case = match &decl.unknown_case {
        Some(name) => {
            let Some(index) = decl.cases.iter().position(|case| &case.name == name) else {
                return Err(PlanError::UnknownCaseMissing { name: name.clone() });
            };
            if decl.cases[index].fields.iter().any(FieldDescriptor::is_decoded) {
                return Err(PlanError::UnknownCaseHasFields { name: name.clone() });
            }
            Some(index)
        }
        None => None,
    };

    let Registered {
        mut keys,
        tag_keys,
        content_keys,
        case_keys,
        tries,
        graphs,
    } = register_cases(decl, &tagging, options)?;

    let root = options.root_container.as_str();
    let mut names = ContainerNamer::new(options);
    let mut bound: Vec<(Vec<KeyId>, String)> = Vec::new();

    let tag_access = |keys: &mut KeyNameAllocator,
                      names: &mut ContainerNamer,
                      bound: &mut Vec<(Vec<KeyId>, String)>| {
        let (setup, container, key) = walk(&tag_keys, root, keys, names, bound);
        let kind = decl
            .cases
            .first()
            .and_then(|case| case.effective_tags().first().map(TagValue::kind))
            .unwrap_or(TagKind::Str);
        TagAccess {
            root: root.to_string(),
            setup,
            container,
            key: keys
                .resolve(key)
                .expect("tag key comes from the enum's allocator"),
            kind,
        }
    };

    // Container the case decoders run against, once tagging is resolved.
    let (tagging_plan, content_root) = match &tagging {
        EnumTagging::External => (
            TaggingPlan::External {
                container: root.to_string(),
            },
            None,
        ),
        EnumTagging::Internal { content, .. } => (
            TaggingPlan::Internal {
                tag: tag_access(&mut keys, &mut names, &mut bound),
                content: *content,
            },
            None,
        ),
        EnumTagging::Adjacent { .. } => {
            let tag = tag_access(&mut keys, &mut names, &mut bound);
            let (setup, parent, key) = walk(&content_keys, root, &mut keys, &mut names, &mut bound);
            let key = keys
                .resolve(key)
                .expect("content key comes from the enum's allocator");
            let container = names.container_for(&key.ident);
            (
                TaggingPlan::Adjacent {
                    tag,
                    content: ContentAccess { setup, parent, key },
                },
                Some(container),
            )
        }
        EnumTagging::Untagged => (
            TaggingPlan::Untagged {
                order: (0..decl.cases.len()).collect(),
            },
            None,
        ),
    };

    let mut cases = Vec::with_capacity(decl.cases.len());
    for (index, case) in decl.cases.iter().enumerate() {
        let trie = &tries[index];
        let graph = &graphs[index];
        let tags = case.effective_tags();
        let key = case_keys[index].and_then(|key| keys.resolve(key));

        // Binding names are scoped per case, but never clash with the
        // enum-level bindings above.
        let mut case_names = names.clone();
        let case_root = match (&tagging, &key, &content_root) {
            (EnumTagging::External, Some(key), _) => case_names.container_for(&key.ident),
            (_, _, Some(content)) => content.clone(),
            _ => root.to_string(),
        };

        let (decode, encode) = match &tagging {
            EnumTagging::Internal { .. } => {
                let mut planner = DecodePlanner::new(trie, graph, &mut keys, &mut case_names);
                for (path, container) in &bound {
                    planner = planner.with_cached(path.clone(), container.clone());
                }
                let decode = planner.plan(root, true)?;
                let mut encode_names = ContainerNamer::new(options);
                let mut planner = EncodePlanner::new(trie, &mut keys, &mut encode_names);
                if let Some(tag) = tags.first() {
                    planner = planner.with_tag(tag.clone());
                }
                (decode, planner.plan(root, false))
            }
            EnumTagging::External => {
                let decode =
                    DecodePlanner::new(trie, graph, &mut keys, &mut case_names).plan(&case_root, false)?;
                let mut encode_names = ContainerNamer::new(options);
                let encode = EncodePlanner::new(trie, &mut keys, &mut encode_names)
                    .plan(&case_root, true);
                (decode, encode)
            }
            EnumTagging::Adjacent { .. } | EnumTagging::Untagged => {
                let decode =
                    DecodePlanner::new(trie, graph, &mut keys, &mut case_names).plan(&case_root, false)?;
                let mut encode_names = ContainerNamer::new(options);
                let encode = EncodePlanner::new(trie, &mut keys, &mut encode_names)
                    .plan(&case_root, false);
                (decode, encode)
            }
        };

        cases.push(CasePlan {
            name: case.name.clone(),
            tags,
            key,
            decode,
            encode,
        });
    }

    debug!(name = %decl.name, keys = keys.len(), "planned enum");
    Ok(EnumPlan {
        name: decl.name.clone(),
        keys: keys.used_keys(),
        tagging: tagging_plan,
        cases,
        unknown_case,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(path: &str) -> TaggingRequest {
        TaggingRequest::TagAt(path.split('.').map(String::from).collect())
    }

    fn content(path: &str) -> TaggingRequest {
        TaggingRequest::ContentAt(path.split('.').map(String::from).collect())
    }

    #[test]
    fn resolves_each_strategy() {
        assert_eq!(EnumTagging::resolve(&[]).unwrap(), EnumTagging::External);
        assert_eq!(
            EnumTagging::resolve(&[TaggingRequest::Untagged]).unwrap(),
            EnumTagging::Untagged
        );
        assert_eq!(
            EnumTagging::resolve(&[tag("meta.type"), TaggingRequest::WholeContent]).unwrap(),
            EnumTagging::Internal {
                tag_path: vec!["meta".into(), "type".into()],
                content: InternalContent::Whole,
            }
        );
        assert_eq!(
            EnumTagging::resolve(&[content("c"), tag("t")]).unwrap(),
            EnumTagging::Adjacent {
                tag_path: vec!["t".into()],
                content_path: vec!["c".into()],
            }
        );
    }

    #[test]
    fn repeated_request_is_harmless() {
        assert!(EnumTagging::resolve(&[tag("t"), tag("t")]).is_ok());
    }

    #[test]
    fn conflicting_requests() {
        assert_eq!(
            EnumTagging::resolve(&[tag("a"), tag("b")]).unwrap_err(),
            PlanError::ConflictingTagging {
                first: tag("a"),
                second: tag("b"),
            }
        );
        assert!(matches!(
            EnumTagging::resolve(&[TaggingRequest::Untagged, tag("a")]),
            Err(PlanError::ConflictingTagging { .. })
        ));
        assert!(matches!(
            EnumTagging::resolve(&[tag("t"), content("c"), TaggingRequest::WholeContent]),
            Err(PlanError::ConflictingTagging { .. })
        ));
    }

    #[test]
    fn content_needs_a_tag() {
        assert_eq!(
            EnumTagging::resolve(&[content("c")]).unwrap_err(),
            PlanError::IncompleteTagging {
                request: content("c")
            }
        );
        assert!(matches!(
            EnumTagging::resolve(&[TaggingRequest::TagAt(vec![])]),
            Err(PlanError::IncompleteTagging { .. })
        ));
    }

    #[test]
    fn default_tag_is_case_name() {
        let case = CaseDescriptor::new("Circle");
        assert_eq!(case.effective_tags(), [TagValue::from("Circle")]);
        let case = CaseDescriptor::new("Circle").tagged(1i64).tagged(2i64);
        assert_eq!(case.effective_tags(), [TagValue::Int(1), TagValue::Int(2)]);
    }

    #[test]
    fn tag_checks() {
        let internal = EnumTagging::Internal {
            tag_path: vec!["type".into()],
            content: InternalContent::Merged,
        };
        let mixed = [
            CaseDescriptor::new("A").tagged(1i64),
            CaseDescriptor::new("B").tagged("b"),
        ];
        assert!(matches!(
            check_tags(&internal, &mixed),
            Err(PlanError::MixedTagKinds {
                expected: TagKind::Int,
                found: TagKind::Str,
                ..
            })
        ));
        assert!(matches!(
            check_tags(&EnumTagging::External, &mixed),
            Err(PlanError::NonStringExternalTag { .. })
        ));

        let duplicated = [
            CaseDescriptor::new("A").tagged("x"),
            CaseDescriptor::new("B").tagged("y").tagged("x"),
        ];
        assert_eq!(
            check_tags(&internal, &duplicated).unwrap_err(),
            PlanError::DuplicateTag {
                tag: "\"x\"".into(),
                first: "A".into(),
                second: "B".into(),
            }
        );
        assert!(check_tags(&EnumTagging::Untagged, &duplicated).is_ok());
    }
}
