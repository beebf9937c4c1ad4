#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod tracing_macros;

mod declaration;
mod decode;
mod dependency;
mod encode;
mod error;
mod fallback;
mod field;
mod key;
mod options;
mod plan;
mod render;
mod tagging;
mod trie;

pub use declaration::{Declaration, EnumDeclaration, StructDeclaration, plan_all};
pub use dependency::{DependencyGraph, DependencyOrderer, Ordering};
pub use error::PlanError;
pub use fallback::FallbackPolicy;
pub use field::{
    BindingGroup, ConverterRef, DefaultExpr, DefaultValue, FieldCustomization, FieldDescriptor,
    Predicate, TypeDescriptor, TypeKind,
};
pub use key::{ContainerNamer, KeyId, KeyNameAllocator, KeyRef, synthesize};
pub use options::{PlannerOptions, RUST_KEYWORDS};
pub use plan::{
    Acquisition, BranchAcquisition, CasePlan, ContentAccess, DecodeBranch, DecodeContainer,
    DecodePlan, DecodeRoot, EncodeBranch, EncodeContainer, EncodePlan, EncodeRoot, EnumPlan,
    Failure, FieldDecode, FieldEncode, Mutability, Plan, Statement, StructPlan, TagAccess,
    TagWrite, TaggingPlan,
};
pub use tagging::{CaseDescriptor, EnumTagging, InternalContent, TagKind, TagValue, TaggingRequest};
pub use trie::{PathTrie, Slot, SlotKind, TrieNode};
