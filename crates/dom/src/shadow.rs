//! The Shadow DOM Mirror: an arena-backed replica of the live document,
//! reconciled from discovery walks and batched mutation records.

use std::collections::{HashMap, HashSet};

use indextree::{Arena, NodeId};
use serde::Serialize;

use crate::identity::{IndexAllocator, NodeIndex};
use crate::live_tree::{LiveNodeKind, LiveTree};
use crate::mutation::{MutationRecord, Summary};

/// Content a shadow node snapshots from its live counterpart.
#[derive(Clone, Debug, PartialEq, Eq)]
enum ShadowKind {
    Document,
    Element { tag: String, attributes: Vec<(String, String)> },
    Text { text: String },
}

/// One node in the mirror. Carries just enough to answer structural and
/// content queries; geometry lives in [`crate::layout_state::LayoutState`]
/// snapshots kept by the tracker, not here.
#[derive(Clone, Debug)]
struct ShadowNode {
    index: NodeIndex,
    kind: ShadowKind,
    ignored: bool,
}

/// A structural snapshot used to compare the mirror against the live
/// document during a consistency check, and to remember the last tree shape
/// both sides agreed on.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct IndexTree {
    /// `(node, parent)` pairs in a stable order, one per attached and
    /// mirrored node.
    edges: Vec<(NodeIndex, Option<NodeIndex>)>,
    /// Attached live nodes with no mirrored index at all. Always zero on a
    /// snapshot built from the mirror itself; a nonzero count on the live
    /// side means the mirror missed something.
    unmirrored: usize,
}

/// What triggered a consistency check.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize)]
pub enum ConsistencySource {
    Discover,
    Mutation { sequence: u64, batch_size: usize },
}

/// One detected divergence between the mirror and the live document.
#[derive(Clone, Debug, Serialize)]
#[allow(clippy::struct_field_names)]
pub struct InconsistencyReport {
    pub live: IndexTree,
    pub shadow: IndexTree,
    pub last_consistent: Option<IndexTree>,
    pub source: ConsistencySource,
    /// The immediately preceding inconsistency, attached once a second
    /// consecutive divergence puts the mirror into degraded mode.
    pub first_of_pair: Option<Box<InconsistencyReport>>,
}

/// Result of one [`ShadowTree::check_consistency`] call.
#[derive(Debug)]
pub enum ConsistencyOutcome {
    Consistent,
    /// First divergence in a potential pair; the mirror is not yet degraded.
    Inconsistent(InconsistencyReport),
    /// Second consecutive divergence; the mirror stops trusting itself.
    Degraded(InconsistencyReport),
}

/// How a single touched node resolved once a mutation batch finished landing.
///
/// Carries enough to translate into a layout event without a caller having
/// to re-walk the mirror: tree position for everything still attached, and
/// the last known position for a node that just detached.
#[derive(Clone, Debug)]
pub struct Classification {
    pub index: NodeIndex,
    pub kind: ClassificationKind,
    pub snapshot: NodeSnapshot,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ClassificationKind {
    Inserted,
    Moved,
    Updated,
    Removed,
}

/// Tree position and content of a shadow node at one instant, independent of
/// why it was captured.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub parent: Option<NodeIndex>,
    pub previous: Option<NodeIndex>,
    pub next: Option<NodeIndex>,
    pub tag: Option<String>,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub ignored: bool,
}

/// The arena-backed mirror of one live document.
pub struct ShadowTree<L: LiveTree> {
    arena: Arena<ShadowNode>,
    root_node: NodeId,
    by_index: HashMap<NodeIndex, NodeId>,
    live_to_index: HashMap<L::Handle, NodeIndex>,
    index_to_live: HashMap<NodeIndex, L::Handle>,
    allocator: IndexAllocator,
    inconsistency_streak: u32,
    degraded: bool,
    last_consistent: Option<IndexTree>,
    pending_first_inconsistency: Option<InconsistencyReport>,
}

impl<L: LiveTree> ShadowTree<L> {
    /// Creates an empty mirror with just a root document node at
    /// [`NodeIndex::ROOT`].
    #[must_use]
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root_node = arena.new_node(ShadowNode {
            index: NodeIndex::ROOT,
            kind: ShadowKind::Document,
            ignored: false,
        });
        let mut by_index = HashMap::new();
        by_index.insert(NodeIndex::ROOT, root_node);
        Self {
            arena,
            root_node,
            by_index,
            live_to_index: HashMap::new(),
            index_to_live: HashMap::new(),
            allocator: IndexAllocator::new(),
            inconsistency_streak: 0,
            degraded: false,
            last_consistent: None,
            pending_first_inconsistency: None,
        }
    }

    /// True once two consecutive consistency checks have diverged; while
    /// degraded, callers should stop relying on mirror content.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Registers the live document's own handle as [`NodeIndex::ROOT`].
    ///
    /// Discovery must call this before indexing any child, otherwise a
    /// later mutation batch that inserts directly under the document (a new
    /// top-level node, not a descendant of an already-discovered one) can
    /// never resolve `parent_index` for it.
    pub fn bind_root(&mut self, live_root: L::Handle) {
        self.live_to_index.insert(live_root, NodeIndex::ROOT);
        self.index_to_live.insert(NodeIndex::ROOT, live_root);
    }

    /// The stable index already assigned to a live handle, if discovered.
    #[must_use]
    pub fn index_of(&self, live: L::Handle) -> Option<NodeIndex> {
        self.live_to_index.get(&live).copied()
    }

    /// The live handle a mirrored index was assigned for, if any.
    ///
    /// Stays resolvable after removal (the index is never reused), so
    /// callers building a `Remove` event can still look up what the node
    /// used to be.
    #[must_use]
    pub fn live_handle(&self, index: NodeIndex) -> Option<L::Handle> {
        self.index_to_live.get(&index).copied()
    }

    /// Tree position and content of a mirrored node, or `None` if `index`
    /// was never assigned.
    #[must_use]
    pub fn node_snapshot(&self, index: NodeIndex) -> Option<NodeSnapshot> {
        let &node_id = self.by_index.get(&index)?;
        let node = self.arena[node_id].get();
        let parent = self.arena[node_id].parent().map(|p| self.arena[p].get().index);
        let previous = self.arena[node_id].previous_sibling().map(|p| self.arena[p].get().index);
        let next = self.arena[node_id].next_sibling().map(|p| self.arena[p].get().index);
        let (tag, attributes, text) = match &node.kind {
            ShadowKind::Document => (None, Vec::new(), None),
            ShadowKind::Element { tag, attributes } => (Some(tag.clone()), attributes.clone(), None),
            ShadowKind::Text { text } => (None, Vec::new(), Some(text.clone())),
        };
        Some(NodeSnapshot { parent, previous, next, tag, attributes, text, ignored: node.ignored })
    }

    /// Inserts a node discovered (or freshly created) on the live side,
    /// assigning it a new index and attaching it under `parent`.
    ///
    /// `next_sibling` places the node before an already-mirrored sibling so
    /// discovery order matches document order; `None` appends at the end.
    pub fn insert_shadow_node(
        &mut self,
        live: L::Handle,
        parent: NodeIndex,
        next_sibling: Option<NodeIndex>,
        kind: &LiveNodeKind,
        ignored: bool,
    ) -> NodeIndex {
        let index = self.allocator.allocate();
        let shadow_kind = match kind {
            LiveNodeKind::Document => ShadowKind::Document,
            LiveNodeKind::Element { tag } => {
                ShadowKind::Element { tag: tag.clone(), attributes: Vec::new() }
            }
            LiveNodeKind::Text { text } => ShadowKind::Text { text: text.clone() },
        };
        let node_id = self.arena.new_node(ShadowNode { index, kind: shadow_kind, ignored });
        self.attach(node_id, parent, next_sibling);
        self.by_index.insert(index, node_id);
        self.live_to_index.insert(live, index);
        self.index_to_live.insert(index, live);
        index
    }

    /// Updates an element's attribute snapshot in place.
    pub fn set_attributes(&mut self, index: NodeIndex, attributes: Vec<(String, String)>) {
        if let Some(&node_id) = self.by_index.get(&index) {
            if let ShadowKind::Element { attributes: slot, .. } =
                &mut self.arena[node_id].get_mut().kind
            {
                *slot = attributes;
            }
        }
    }

    /// Updates a text node's content in place.
    pub fn set_text(&mut self, index: NodeIndex, text: String) {
        if let Some(&node_id) = self.by_index.get(&index) {
            if let ShadowKind::Text { text: slot } = &mut self.arena[node_id].get_mut().kind {
                *slot = text;
            }
        }
    }

    /// Re-parents an already-mirrored node, as a move within the live tree.
    pub fn move_node(&mut self, index: NodeIndex, parent: NodeIndex, next_sibling: Option<NodeIndex>) {
        if let Some(&node_id) = self.by_index.get(&index) {
            node_id.detach(&mut self.arena);
            self.attach(node_id, parent, next_sibling);
        }
    }

    /// Detaches a node and its whole mirrored subtree from the tree shape.
    ///
    /// Indices stay resolvable afterwards (never reused; [`Self::by_index`]
    /// and [`Self::index_to_live`] are left alone so a `Remove` event can
    /// still describe what the node used to be), but the forward live-handle
    /// annotation is cleared for the node and every descendant, per the
    /// "clears the annotation from the node and all descendants" removal
    /// rule.
    fn remove_subtree(&mut self, index: NodeIndex) {
        let Some(&node_id) = self.by_index.get(&index) else { return };
        let descendants: Vec<NodeId> = node_id.descendants(&self.arena).collect();
        for descendant_id in descendants {
            let descendant_index = self.arena[descendant_id].get().index;
            if let Some(handle) = self.index_to_live.get(&descendant_index).copied() {
                self.live_to_index.remove(&handle);
            }
        }
        node_id.detach(&mut self.arena);
    }

    fn attach(&mut self, node_id: NodeId, parent: NodeIndex, next_sibling: Option<NodeIndex>) {
        let Some(&parent_id) = self.by_index.get(&parent) else { return };
        match next_sibling.and_then(|idx| self.by_index.get(&idx).copied()) {
            Some(sibling_id) => sibling_id.insert_before(node_id, &mut self.arena),
            None => parent_id.append(node_id, &mut self.arena),
        }
    }

    /// Applies a batch of raw mutation records, classifying each touched
    /// node exactly once by its state after the whole batch has landed
    /// rather than record-by-record, so an intermediate state never leaks
    /// into the emitted summary.
    pub fn apply_mutation_batch(&mut self, live: &L, records: &[MutationRecord<L::Handle>]) -> Summary {
        let mut summary = Summary::default();
        for classification in self.classify_mutation_batch(live, records) {
            match classification.kind {
                ClassificationKind::Inserted => summary.inserted += 1,
                ClassificationKind::Moved => summary.moved += 1,
                ClassificationKind::Updated => summary.updated += 1,
                ClassificationKind::Removed => summary.removed += 1,
            }
        }
        summary
    }

    /// Same reconciliation as [`Self::apply_mutation_batch`], but returns the
    /// per-node classifications (with enough snapshot detail to build layout
    /// events) instead of only their counts.
    ///
    /// A real `MutationRecord` carries only the node whose own children,
    /// attributes, or text changed — never the added/removed nodes
    /// themselves — so a `ChildList` record is expanded against the mirror's
    /// own last-known children before anything is classified: anything live
    /// under `target` that the mirror doesn't yet know about is a candidate
    /// insertion, and anything the mirror still has mirrored under `target`
    /// that live no longer lists is a candidate removal. `Attributes` and
    /// `CharacterData` records name their target directly.
    ///
    /// Classification then proceeds as a small fixed-point: a candidate
    /// whose live parent is itself a pending insertion in this same batch is
    /// requeued instead of dropped, so record order within a batch never
    /// matters (the spec's "survive out-of-order mutation deliveries"
    /// requirement). A node found to be a conflicting end state (e.g. moved
    /// then removed within the same batch) is classified once, by its
    /// terminal observed state — the (shadowed?, attached?) check below
    /// always reads current state, never an intermediate one.
    pub fn classify_mutation_batch(
        &mut self,
        live: &L,
        records: &[MutationRecord<L::Handle>],
    ) -> Vec<Classification> {
        let mut queued = HashSet::new();
        let mut pending = Vec::new();
        for record in records {
            match record {
                MutationRecord::ChildList { target } => {
                    for child in self.child_list_candidates(live, *target) {
                        if queued.insert(child) {
                            pending.push(child);
                        }
                    }
                }
                MutationRecord::Attributes { target } | MutationRecord::CharacterData { target } => {
                    if queued.insert(*target) {
                        pending.push(*target);
                    }
                }
            }
        }

        let mut out = Vec::new();
        let mut handled = HashSet::new();
        while !pending.is_empty() {
            let mut made_progress = false;
            let mut deferred = Vec::new();
            for handle in pending {
                if handled.contains(&handle) {
                    continue;
                }
                if self.classify_one(live, handle, &mut handled, &mut out) {
                    made_progress = true;
                } else {
                    deferred.push(handle);
                }
            }
            if !made_progress {
                break;
            }
            pending = deferred;
        }
        out
    }

    /// Live children of `target` plus whatever the mirror still has
    /// mirrored under `target`, so both new and removed children surface as
    /// candidates even though the record itself only names `target`.
    fn child_list_candidates(&self, live: &L, target: L::Handle) -> Vec<L::Handle> {
        let mut candidates = live.children(target);
        if let Some(&node_id) = self.index_of(target).and_then(|index| self.by_index.get(&index)) {
            for child_id in node_id.children(&self.arena) {
                let child_index = self.arena[child_id].get().index;
                if let Some(handle) = self.index_to_live.get(&child_index).copied() {
                    if !candidates.contains(&handle) {
                        candidates.push(handle);
                    }
                }
            }
        }
        candidates
    }

    /// Classifies a single candidate. Returns `false` only when `handle`
    /// needs inserting but its live parent has no shadow index yet (the
    /// parent is itself a pending insertion later in this same batch);
    /// the caller retries such entries once the rest of the batch has made
    /// progress.
    fn classify_one(
        &mut self,
        live: &L,
        handle: L::Handle,
        handled: &mut HashSet<L::Handle>,
        out: &mut Vec<Classification>,
    ) -> bool {
        let already_shadowed = self.index_of(handle);
        let attached = live.is_attached(handle);

        match (already_shadowed, attached) {
            (None, false) => {
                handled.insert(handle);
                true
            }
            (None, true) => {
                let Some(parent_handle) = live.parent(handle) else {
                    handled.insert(handle);
                    return true;
                };
                let Some(parent_index) = self.index_of(parent_handle) else {
                    return false;
                };
                handled.insert(handle);
                let next_sibling = self.next_mirrored_sibling(live, handle);
                let kind = live.kind(handle);
                let ignored = live.is_ignored(handle);
                let index = self.insert_shadow_node(handle, parent_index, next_sibling, &kind, ignored);
                self.sync_content(live, handle, index);
                let snapshot = self.node_snapshot(index).unwrap_or_default();
                out.push(Classification { index, kind: ClassificationKind::Inserted, snapshot });
                for child in live.children(handle) {
                    self.classify_one(live, child, handled, out);
                }
                true
            }
            (Some(index), false) => {
                handled.insert(handle);
                let snapshot = self.node_snapshot(index).unwrap_or_default();
                self.remove_subtree(index);
                self.live_to_index.remove(&handle);
                out.push(Classification { index, kind: ClassificationKind::Removed, snapshot });
                true
            }
            (Some(index), true) => {
                handled.insert(handle);
                let moved = self.reparent_if_needed(live, handle, index);
                self.sync_content(live, handle, index);
                let snapshot = self.node_snapshot(index).unwrap_or_default();
                let kind = if moved { ClassificationKind::Moved } else { ClassificationKind::Updated };
                out.push(Classification { index, kind, snapshot });
                true
            }
        }
    }

    fn reparent_if_needed(&mut self, live: &L, handle: L::Handle, index: NodeIndex) -> bool {
        let Some(parent_handle) = live.parent(handle) else { return false };
        let Some(parent_index) = self.index_of(parent_handle) else { return false };
        let node_id = self.by_index[&index];
        let current_parent = self.arena[node_id].parent().map(|p| self.arena[p].get().index);
        let next_sibling = self.next_mirrored_sibling(live, handle);
        let needs_move = current_parent != Some(parent_index) || {
            let current_next = self.arena[node_id]
                .next_sibling()
                .map(|s| self.arena[s].get().index);
            current_next != next_sibling
        };
        if needs_move {
            self.move_node(index, parent_index, next_sibling);
        }
        needs_move
    }

    fn next_mirrored_sibling(&self, live: &L, handle: L::Handle) -> Option<NodeIndex> {
        let parent = live.parent(handle)?;
        let siblings = live.children(parent);
        let position = siblings.iter().position(|h| *h == handle)?;
        siblings[position + 1..].iter().find_map(|h| self.index_of(*h))
    }

    fn sync_content(&mut self, live: &L, handle: L::Handle, index: NodeIndex) {
        match live.kind(handle) {
            LiveNodeKind::Element { .. } => self.set_attributes(index, live.attributes(handle)),
            LiveNodeKind::Text { text } => self.set_text(index, text),
            LiveNodeKind::Document => {}
        }
    }

    /// Builds a structural snapshot of everything currently reachable from
    /// the mirror's root.
    #[must_use]
    pub fn to_index_tree(&self) -> IndexTree {
        let mut edges = Vec::new();
        for node_id in self.root_node.descendants(&self.arena) {
            let node = self.arena[node_id].get();
            let parent_index = self.arena[node_id].parent().map(|p| self.arena[p].get().index);
            edges.push((node.index, parent_index));
        }
        IndexTree { edges, unmirrored: 0 }
    }

    /// Builds the same structural snapshot from the live document, via the
    /// mirror's handle-to-index mapping. Live nodes with no mirrored index
    /// yet are omitted; their absence is itself a divergence signal.
    fn live_index_tree(&self, live: &L) -> IndexTree {
        let root = live.root();
        let mut edges = vec![(NodeIndex::ROOT, None)];
        let mut unmirrored = 0;
        let mut stack = live.children(root);
        while let Some(handle) = stack.pop() {
            match self.index_of(handle) {
                Some(index) => {
                    let parent_index =
                        live.parent(handle).and_then(|p| self.index_of(p)).or(Some(NodeIndex::ROOT));
                    edges.push((index, parent_index));
                }
                None => unmirrored += 1,
            }
            stack.extend(live.children(handle));
        }
        edges.sort_by_key(|(index, _)| *index);
        IndexTree { edges, unmirrored }
    }

    /// Compares the mirror's current shape against the live document and
    /// updates the degraded-mode streak. The caller supplies the batch that
    /// triggered the check for attribution in the resulting report.
    pub fn check_consistency(&mut self, live: &L, source: ConsistencySource) -> ConsistencyOutcome {
        let mut live_tree = self.live_index_tree(live);
        let mut shadow_tree = self.to_index_tree();
        live_tree.edges.sort_by_key(|(index, _)| *index);
        shadow_tree.edges.sort_by_key(|(index, _)| *index);

        if live_tree == shadow_tree {
            self.inconsistency_streak = 0;
            self.pending_first_inconsistency = None;
            self.last_consistent = Some(shadow_tree);
            return ConsistencyOutcome::Consistent;
        }

        self.inconsistency_streak += 1;
        let report = InconsistencyReport {
            live: live_tree,
            shadow: shadow_tree,
            last_consistent: self.last_consistent.clone(),
            source,
            first_of_pair: None,
        };

        if self.inconsistency_streak == 1 {
            self.pending_first_inconsistency = Some(report.clone());
            ConsistencyOutcome::Inconsistent(report)
        } else {
            self.degraded = true;
            let first = self.pending_first_inconsistency.take();
            let mut paired = report;
            paired.first_of_pair = first.map(Box::new);
            ConsistencyOutcome::Degraded(paired)
        }
    }
}

impl<L: LiveTree> Default for ShadowTree<L> {
    fn default() -> Self {
        Self::new()
    }
}
