//! Node identity: stable, monotonically-increasing indices for live DOM nodes.
//!
//! An index is assigned the first time a node is sighted (discovery or
//! mutation-insert) and never reassigned or reused, even after removal.

use serde::{Deserialize, Serialize};

/// A stable identity for a node the tracker has observed.
///
/// Indices are attached out-of-band (see [`crate::live_tree::LiveTree`]); they are never
/// baked into attributes on the node itself.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct NodeIndex(u64);

impl NodeIndex {
    /// The index of the shadow document root, always present.
    pub const ROOT: NodeIndex = NodeIndex(0);

    /// Raw numeric value, exposed for wire projection and test assertions.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Mints fresh, never-reused [`NodeIndex`] values for a single session.
#[derive(Debug)]
pub struct IndexAllocator {
    next: u64,
}

impl IndexAllocator {
    /// Creates an allocator whose first minted index follows [`NodeIndex::ROOT`].
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 1 }
    }

    /// Allocates the next index in the session.
    #[inline]
    pub fn allocate(&mut self) -> NodeIndex {
        let index = NodeIndex(self.next);
        self.next = self.next.wrapping_add(1);
        index
    }
}

impl Default for IndexAllocator {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_unique_monotonic_indices() {
        let mut allocator = IndexAllocator::new();
        let first = allocator.allocate();
        let second = allocator.allocate();
        let third = allocator.allocate();
        assert!(first.get() < second.get());
        assert!(second.get() < third.get());
    }

    #[test]
    fn root_index_is_reserved() {
        let mut allocator = IndexAllocator::new();
        let first = allocator.allocate();
        assert_ne!(first, NodeIndex::ROOT);
    }
}
