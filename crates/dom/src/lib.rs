//! Shadow DOM Mirror: node identity, an arena-backed replica of the live
//! document, mutation-batch classification, and consistency checking.
//!
//! The mirror never touches a real document directly; it is generic over
//! [`LiveTree`], so an embedder's browser DOM and this crate's own
//! [`fake`] test tree both drive the same reconciliation code.

pub mod fake;
pub mod identity;
pub mod layout_state;
pub mod live_tree;
pub mod mutation;
pub mod shadow;

pub use identity::{IndexAllocator, NodeIndex};
pub use layout_state::{Action, LayoutGeometry, LayoutPayload, LayoutState, Source};
pub use live_tree::{LiveNodeKind, LiveTree};
pub use mutation::{MutationRecord, Summary};
pub use shadow::{
    Classification, ClassificationKind, ConsistencyOutcome, ConsistencySource, IndexTree,
    InconsistencyReport, NodeSnapshot, ShadowTree,
};
