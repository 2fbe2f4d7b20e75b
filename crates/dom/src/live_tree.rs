//! Abstraction over the authoritative, live document.
//!
//! A real embedding implements this against the browser DOM (out of scope for
//! this crate; see the purpose/scope notes). Tests and the [`crate::fake`]
//! module implement it against a plain in-memory tree so the reconciliation
//! algorithm in [`crate::shadow`] can be exercised without a browser.

use std::fmt::Debug;
use std::hash::Hash;

use crate::layout_state::LayoutGeometry;

/// One node's content, independent of tree shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LiveNodeKind {
    Document,
    Element { tag: String },
    Text { text: String },
}

/// Read-only view of the authoritative document the tracker mirrors.
///
/// `Handle` is whatever opaque reference the embedder's tree uses (a DOM node
/// reference in a browser, an arena key in these tests). The tracker never
/// interprets it beyond equality and hashing.
pub trait LiveTree {
    type Handle: Copy + Eq + Hash + Debug;

    /// The document root. Always reachable from itself.
    fn root(&self) -> Self::Handle;

    /// The parent of `node`, or `None` if `node` is the root or detached.
    fn parent(&self, node: Self::Handle) -> Option<Self::Handle>;

    /// Children of `node`, in document order.
    fn children(&self, node: Self::Handle) -> Vec<Self::Handle>;

    /// Content classification used to decide what a shadow node snapshots.
    fn kind(&self, node: Self::Handle) -> LiveNodeKind;

    /// Current attributes of an element node, empty for other kinds.
    fn attributes(&self, node: Self::Handle) -> Vec<(String, String)>;

    /// Geometry and scroll position for an element node, when known.
    ///
    /// `None` before the embedder has measured the node (the discovery
    /// placeholder case) and always for non-element kinds.
    fn geometry(&self, node: Self::Handle) -> Option<LayoutGeometry> {
        let _ = node;
        None
    }

    /// Policy/ignore flag: script, style, or explicitly excluded nodes.
    ///
    /// Ignored nodes still participate in tree shape but never carry content
    /// snapshots.
    fn is_ignored(&self, node: Self::Handle) -> bool {
        let _ = node;
        false
    }

    /// True if `node` is reachable from the document root by walking parents.
    ///
    /// The default implementation is the browser-agnostic definition used by
    /// the reconciliation algorithm; embedders rarely need to override it.
    fn is_attached(&self, node: Self::Handle) -> bool {
        let root = self.root();
        let mut current = node;
        loop {
            if current == root {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }
}
