//! Planner configuration.

use serde::{Deserialize, Serialize};

/// Words that can never be used as a key identifier.
///
/// The plan is meant to be emitted as Rust, so the default set is the
/// strict and reserved keyword list of the 2024 edition.
pub const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "match", "mod",
    "move", "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait",
    "true", "type", "unsafe", "use", "where", "while", "abstract", "become", "box", "do",
    "final", "macro", "override", "priv", "typeof", "unsized", "virtual", "yield", "try",
];

/// Options that shape naming in emitted plans.
///
/// Planning semantics never depend on these: they only decide which
/// identifiers end up in the plan.
///
/// # Example
///
/// ```
/// use pathcodec::PlannerOptions;
///
/// let options = PlannerOptions::default()
///     .with_root_container("root")
///     .reserve("value");
/// assert_eq!(options.root_container, "root");
/// assert!(options.is_reserved("value"));
/// assert!(options.is_reserved("type"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerOptions {
    /// Identifiers the key allocator must never hand out.
    pub reserved_words: Vec<String>,
    /// Binding name of the top-level keyed container.
    pub root_container: String,
    /// Suffix appended to a key identifier to name its nested container.
    pub container_suffix: String,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            reserved_words: RUST_KEYWORDS.iter().map(|w| w.to_string()).collect(),
            root_container: "container".to_string(),
            container_suffix: "_container".to_string(),
        }
    }
}

impl PlannerOptions {
    /// Replace the reserved word list.
    pub fn with_reserved_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved_words = words.into_iter().map(Into::into).collect();
        self
    }

    /// Add one word to the reserved list.
    pub fn reserve(mut self, word: impl Into<String>) -> Self {
        self.reserved_words.push(word.into());
        self
    }

    /// Set the name of the top-level container binding.
    pub fn with_root_container(mut self, name: impl Into<String>) -> Self {
        self.root_container = name.into();
        self
    }

    /// Set the suffix used to name nested containers.
    pub fn with_container_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.container_suffix = suffix.into();
        self
    }

    /// Whether `word` is reserved.
    pub fn is_reserved(&self, word: &str) -> bool {
        self.reserved_words.iter().any(|w| w == word)
    }
}
