//! Raw mutation records, as an embedder observes them, before classification.
//!
//! A `MutationObserver`-style embedding hands the tracker a batch of these
//! per animation frame. The shadow tree never trusts per-record ordering
//! across a batch: it only trusts the final observed state of each touched
//! node, reached by replaying [`LiveTree`] queries after the whole batch has
//! landed.

/// One raw observation within a mutation batch.
///
/// `ChildList` and `Attributes` mirror the two `MutationObserver` record
/// kinds that matter for tree shape and content; `CharacterData` covers text
/// node edits.
#[derive(Clone, Debug)]
pub enum MutationRecord<H> {
    ChildList { target: H },
    Attributes { target: H },
    CharacterData { target: H },
}

impl<H: Copy> MutationRecord<H> {
    /// The node this record concerns, regardless of kind.
    #[must_use]
    pub const fn target(&self) -> H {
        match self {
            Self::ChildList { target }
            | Self::Attributes { target }
            | Self::CharacterData { target } => *target,
        }
    }
}

/// Counts of classified outcomes from one `apply_mutation_batch` call.
#[derive(Copy, Clone, Default, Eq, PartialEq, Debug)]
pub struct Summary {
    pub inserted: usize,
    pub moved: usize,
    pub updated: usize,
    pub removed: usize,
}

impl Summary {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.inserted + self.moved + self.updated + self.removed
    }
}
