//! The Layout Tracker: discovery, asynchronous backfill, mutation-batch
//! translation, and scroll/input watch bindings — the plugin that drives
//! the continuous feedback loop between the live document and its shadow.
//!
//! Owns a [`dom::ShadowTree`] and translates everything that comes out of
//! it (discovery, mutation classification, consistency checks) into
//! [`wire::Event`]s pushed through an [`pipeline::EventPipeline`]. Has no
//! opinion on *how* mutations and scroll/input samples arrive — a real
//! embedding wires a `MutationObserver` and DOM listeners to
//! [`LayoutTracker::on_mutation_batch`]/[`LayoutTracker::observe_scroll`]/
//! [`LayoutTracker::observe_input`]; this crate's tests drive the same
//! entry points directly against [`dom::fake::FakeTree`].

mod backfill;
mod watch;

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

pub use backfill::BackfillScheduler;
pub use watch::WatchRegistry;

use dom::{
    Action, ClassificationKind, ConsistencyOutcome, ConsistencySource, LayoutGeometry, LayoutPayload,
    LayoutState, LiveNodeKind, LiveTree, MutationRecord, NodeIndex, NodeSnapshot, ShadowTree, Source,
};
use host::{Plugin, PluginContext};
use pipeline::{EventPipeline, PartialEvent};
use wire::{InstrumentationKind, Origin};

fn action_wire_type(action: Action) -> &'static str {
    match action {
        Action::Insert => "Insert",
        Action::Update => "Update",
        Action::Move => "Move",
        Action::Remove => "Remove",
    }
}

fn is_input_like(tag: Option<&str>) -> bool {
    matches!(tag, Some("input") | Some("select") | Some("textarea"))
}

fn is_image_like(tag: Option<&str>) -> bool {
    matches!(tag, Some("img") | Some("picture") | Some("canvas") | Some("video") | Some("svg"))
}

fn filter_attributes(attributes: &[(String, String)], sensitive: &[String]) -> Vec<(String, String)> {
    attributes.iter().filter(|(key, _)| !sensitive.iter().any(|redacted| redacted == key)).cloned().collect()
}

/// A mutation batch received while backfill is still in progress, stamped
/// at arrival time so replay preserves the same timestamp and
/// `mutation_sequence` it would have gotten had it been processed
/// immediately.
struct QueuedBatch<H> {
    time: u64,
    sequence: u64,
    records: Vec<MutationRecord<H>>,
}

/// The Layout Tracker plugin. One instance observes one [`LiveTree`] for
/// the lifetime of an impression.
pub struct LayoutTracker<L: LiveTree> {
    live: Rc<RefCell<L>>,
    shadow: ShadowTree<L>,
    mutation_sequence: u64,
    backfill: BackfillScheduler,
    backfill_queue: VecDeque<NodeIndex>,
    backfilling: bool,
    queued_batches: VecDeque<QueuedBatch<L::Handle>>,
    discovery_time: HashMap<NodeIndex, u64>,
    watch: WatchRegistry,
    last_layout: HashMap<NodeIndex, LayoutState>,
    validate_consistency: bool,
    show_text: bool,
    show_images: bool,
    sensitive_attributes: Vec<String>,
}

impl<L: LiveTree> LayoutTracker<L> {
    /// Builds a tracker over a freshly-constructed live tree.
    #[must_use]
    pub fn new(live: L) -> Self {
        Self::with_shared_tree(Rc::new(RefCell::new(live)))
    }

    /// Builds a tracker sharing an already-constructed live tree, so a test
    /// driver can mutate it through the same handle the tracker observes.
    #[must_use]
    pub fn with_shared_tree(live: Rc<RefCell<L>>) -> Self {
        Self {
            live,
            shadow: ShadowTree::new(),
            mutation_sequence: 0,
            backfill: BackfillScheduler::new(std::time::Duration::from_millis(50)),
            backfill_queue: VecDeque::new(),
            backfilling: false,
            queued_batches: VecDeque::new(),
            discovery_time: HashMap::new(),
            watch: WatchRegistry::new(),
            last_layout: HashMap::new(),
            validate_consistency: true,
            show_text: true,
            show_images: true,
            sensitive_attributes: Vec::new(),
        }
    }

    /// A cloned handle to the tree this tracker observes.
    #[must_use]
    pub fn live(&self) -> Rc<RefCell<L>> {
        Rc::clone(&self.live)
    }

    /// The stable index assigned to a live handle, if discovered.
    #[must_use]
    pub fn index_of(&self, handle: L::Handle) -> Option<NodeIndex> {
        self.shadow.index_of(handle)
    }

    /// `true` while backfill has placeholder nodes left to upgrade; while
    /// true, [`Self::on_mutation_batch`] queues rather than processes.
    #[must_use]
    pub const fn is_backfilling(&self) -> bool {
        self.backfilling
    }

    /// `true` once two consecutive consistency checks have diverged.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.shadow.is_degraded()
    }

    /// Processes one bounded time slice of backfill, emitting a `Discover`
    /// `Insert` event (stamped with the original discovery time) for every
    /// placeholder it upgrades. Returns `true` once backfill has fully
    /// drained and any mutation batches queued during it have been
    /// replayed in arrival order.
    ///
    /// # Errors
    /// Propagates the first event-forwarding failure (background worker
    /// exited).
    pub fn tick(&mut self, pipeline: &EventPipeline) -> anyhow::Result<bool> {
        if !self.backfilling {
            return Ok(true);
        }

        let mut to_emit = Vec::new();
        let drained = {
            let backfill = &self.backfill;
            let queue = &mut self.backfill_queue;
            backfill.tick(queue, |index| to_emit.push(index))
        };

        let live = Rc::clone(&self.live);
        let borrowed = live.borrow();
        for index in to_emit {
            self.emit_backfill_event(pipeline, &borrowed, index)?;
        }
        drop(borrowed);

        if drained {
            self.backfilling = false;
            let queued = std::mem::take(&mut self.queued_batches);
            for batch in queued {
                self.process_batch(pipeline, batch.time, batch.sequence, batch.records)?;
            }
        }
        Ok(drained)
    }

    /// Ingests one mutation-observer-shaped batch. Dropped outright while
    /// degraded; queued while backfill is in progress; otherwise classified
    /// and translated into layout events immediately.
    ///
    /// # Errors
    /// Propagates the first event-forwarding failure.
    pub fn on_mutation_batch(
        &mut self,
        pipeline: &EventPipeline,
        records: Vec<MutationRecord<L::Handle>>,
    ) -> anyhow::Result<()> {
        if self.shadow.is_degraded() {
            log::debug!("tracker: degraded, dropping a batch of {} records", records.len());
            return Ok(());
        }

        let time = pipeline.get_timestamp(false);
        let sequence = self.mutation_sequence;
        self.mutation_sequence = self.mutation_sequence.wrapping_add(1);

        if self.backfilling {
            self.queued_batches.push_back(QueuedBatch { time, sequence, records });
            return Ok(());
        }
        self.process_batch(pipeline, time, sequence, records)
    }

    /// Feeds an observed scroll sample into the distance-throttled watch
    /// registry; emits a `Scroll`/`Update` layout event only if the sample
    /// clears the threshold.
    ///
    /// # Errors
    /// Propagates the first event-forwarding failure.
    pub fn observe_scroll(&mut self, pipeline: &EventPipeline, index: NodeIndex, x: f64, y: f64) -> anyhow::Result<()> {
        if !self.watch.accept_scroll(index, x, y) {
            return Ok(());
        }
        let Some(previous) = self.last_layout.get(&index) else { return Ok(()) };
        let mut state = previous.derive(Source::Scroll, Action::Update);
        if let LayoutPayload::Element(geometry) = &mut state.layout {
            geometry.scroll_x = Some(x);
            geometry.scroll_y = Some(y);
        }
        self.last_layout.insert(index, state.clone());
        let time = pipeline.get_timestamp(false);
        let data = serde_json::to_value(&state)?;
        pipeline.add_event(PartialEvent::new(Origin::Plugin("layout".to_string()), "Update", data).at(time))?;
        Ok(())
    }

    /// Feeds an observed input/change sample into the watch registry, if
    /// `index` carries an input-shaped watch.
    ///
    /// # Errors
    /// Propagates the first event-forwarding failure.
    pub fn observe_input(&mut self, pipeline: &EventPipeline, index: NodeIndex) -> anyhow::Result<()> {
        if !self.watch.is_watching_input(index) {
            return Ok(());
        }
        let Some(previous) = self.last_layout.get(&index) else { return Ok(()) };
        let state = previous.derive(Source::Input, Action::Update);
        self.last_layout.insert(index, state.clone());
        let time = pipeline.get_timestamp(false);
        let data = serde_json::to_value(&state)?;
        pipeline.add_event(PartialEvent::new(Origin::Plugin("layout".to_string()), "Update", data).at(time))?;
        Ok(())
    }

    fn discover(&mut self, pipeline: &EventPipeline) -> anyhow::Result<()> {
        let now = pipeline.get_timestamp(false);
        let live = Rc::clone(&self.live);
        let borrowed = live.borrow();
        let root = borrowed.root();
        self.shadow.bind_root(root);
        self.discover_node(&borrowed, root, NodeIndex::ROOT, now);
        drop(borrowed);

        self.backfilling = !self.backfill_queue.is_empty();
        if self.validate_consistency {
            self.run_consistency_check(pipeline, ConsistencySource::Discover)?;
        }
        Ok(())
    }

    fn discover_node(&mut self, live: &L, handle: L::Handle, shadow_parent: NodeIndex, now: u64) {
        for child in live.children(handle) {
            let kind = live.kind(child);
            let ignored = live.is_ignored(child);
            let index = self.shadow.insert_shadow_node(child, shadow_parent, None, &kind, ignored);
            if let LiveNodeKind::Element { .. } = &kind {
                self.shadow.set_attributes(index, live.attributes(child));
            }
            self.discovery_time.insert(index, now);
            self.backfill_queue.push_back(index);
            self.discover_node(live, child, index, now);
        }
    }

    fn emit_backfill_event(&mut self, pipeline: &EventPipeline, live: &L, index: NodeIndex) -> anyhow::Result<()> {
        let Some(snapshot) = self.shadow.node_snapshot(index) else { return Ok(()) };
        let time = self.discovery_time.get(&index).copied().unwrap_or_else(|| pipeline.get_timestamp(false));
        let layout = self.layout_payload(live, index, &snapshot, false);
        let state = LayoutState {
            index,
            parent: snapshot.parent,
            previous: snapshot.previous,
            next: snapshot.next,
            source: Source::Discover,
            action: Action::Insert,
            tag: snapshot.tag.clone(),
            attributes: filter_attributes(&snapshot.attributes, &self.sensitive_attributes),
            layout,
            mutation_sequence: None,
        };
        self.last_layout.insert(index, state.clone());
        let data = serde_json::to_value(&state)?;
        pipeline.add_event(PartialEvent::new(Origin::Plugin("layout".to_string()), "Insert", data).at(time))?;
        self.register_watch(index, &state);
        Ok(())
    }

    fn process_batch(
        &mut self,
        pipeline: &EventPipeline,
        time: u64,
        sequence: u64,
        records: Vec<MutationRecord<L::Handle>>,
    ) -> anyhow::Result<()> {
        let live = Rc::clone(&self.live);
        let borrowed = live.borrow();
        let classifications = self.shadow.classify_mutation_batch(&borrowed, &records);
        drop(borrowed);

        if self.validate_consistency {
            let outcome = self.run_consistency_check(
                pipeline,
                ConsistencySource::Mutation { sequence, batch_size: records.len() },
            )?;
            if !matches!(outcome, ConsistencyOutcome::Consistent) {
                return Ok(());
            }
        }

        let live = Rc::clone(&self.live);
        let borrowed = live.borrow();
        self.emit_classifications(pipeline, &borrowed, classifications, time, sequence)
    }

    fn emit_classifications(
        &mut self,
        pipeline: &EventPipeline,
        live: &L,
        classifications: Vec<dom::Classification>,
        time: u64,
        sequence: u64,
    ) -> anyhow::Result<()> {
        // insert -> move -> update -> remove, regardless of per-node
        // processing order within the batch.
        let mut inserted = Vec::new();
        let mut moved = Vec::new();
        let mut updated = Vec::new();
        let mut removed = Vec::new();
        for classification in classifications {
            match classification.kind {
                ClassificationKind::Inserted => inserted.push(classification),
                ClassificationKind::Moved => moved.push(classification),
                ClassificationKind::Updated => updated.push(classification),
                ClassificationKind::Removed => removed.push(classification),
            }
        }

        for classification in inserted.into_iter().chain(moved).chain(updated).chain(removed) {
            self.emit_one(pipeline, live, classification, time, sequence)?;
        }
        Ok(())
    }

    fn emit_one(
        &mut self,
        pipeline: &EventPipeline,
        live: &L,
        classification: dom::Classification,
        time: u64,
        sequence: u64,
    ) -> anyhow::Result<()> {
        let action = match classification.kind {
            ClassificationKind::Inserted => Action::Insert,
            ClassificationKind::Moved => Action::Move,
            ClassificationKind::Updated => Action::Update,
            ClassificationKind::Removed => Action::Remove,
        };
        let removed = matches!(action, Action::Remove);
        let snapshot = classification.snapshot;
        let layout = self.layout_payload(live, classification.index, &snapshot, removed);
        let state = LayoutState {
            index: classification.index,
            parent: snapshot.parent,
            previous: snapshot.previous,
            next: snapshot.next,
            source: Source::Mutation,
            action,
            tag: snapshot.tag.clone(),
            attributes: filter_attributes(&snapshot.attributes, &self.sensitive_attributes),
            layout,
            mutation_sequence: Some(sequence),
        };
        self.last_layout.insert(classification.index, state.clone());
        let data = serde_json::to_value(&state)?;
        pipeline.add_event(PartialEvent::new(Origin::Plugin("layout".to_string()), action_wire_type(action), data).at(time))?;

        if matches!(action, Action::Insert | Action::Update) {
            self.register_watch(classification.index, &state);
        }
        Ok(())
    }

    fn layout_payload(&self, live: &L, index: NodeIndex, snapshot: &NodeSnapshot, removed: bool) -> LayoutPayload {
        if snapshot.ignored {
            return LayoutPayload::Ignored;
        }
        if let Some(text) = &snapshot.text {
            return if self.show_text { LayoutPayload::Text(text.clone()) } else { LayoutPayload::Redacted };
        }
        if let Some(tag) = &snapshot.tag {
            if !self.show_images && is_image_like(Some(tag.as_str())) {
                return LayoutPayload::Redacted;
            }
            let geometry = if removed {
                None
            } else {
                self.shadow.live_handle(index).and_then(|handle| live.geometry(handle))
            };
            return LayoutPayload::Element(geometry.unwrap_or_else(LayoutGeometry::default));
        }
        LayoutPayload::None
    }

    /// Registers scroll/input watches the first time an element's layout
    /// state is emitted with `Insert`/`Update`; the flag is not
    /// re-evaluated afterwards (see `DESIGN.md` for the open-question
    /// decision this encodes).
    fn register_watch(&mut self, index: NodeIndex, state: &LayoutState) {
        if let LayoutPayload::Element(geometry) = &state.layout {
            if geometry.scroll_x.is_some() || geometry.scroll_y.is_some() {
                self.watch.watch_scroll(index, (geometry.scroll_x.unwrap_or(0.0), geometry.scroll_y.unwrap_or(0.0)));
            }
        }
        if is_input_like(state.tag.as_deref()) {
            self.watch.watch_input(index);
        }
    }

    fn run_consistency_check(
        &mut self,
        pipeline: &EventPipeline,
        source: ConsistencySource,
    ) -> anyhow::Result<ConsistencyOutcome> {
        let live = Rc::clone(&self.live);
        let borrowed = live.borrow();
        let outcome = self.shadow.check_consistency(&borrowed, source);
        drop(borrowed);

        match &outcome {
            ConsistencyOutcome::Consistent => {}
            ConsistencyOutcome::Inconsistent(report) => {
                log::warn!("tracker: shadow/live divergence detected ({source:?})");
                pipeline.instrument(InstrumentationKind::ShadowDomInconsistent, serde_json::to_value(report)?)?;
            }
            ConsistencyOutcome::Degraded(report) => {
                log::error!("tracker: second consecutive divergence, entering degraded mode");
                pipeline.instrument(InstrumentationKind::ShadowDomInconsistent, serde_json::to_value(report)?)?;
            }
        }
        Ok(outcome)
    }
}

impl<L: LiveTree> Plugin for LayoutTracker<L> {
    fn name(&self) -> &'static str {
        "layout"
    }

    fn reset(&mut self) {
        self.shadow = ShadowTree::new();
        self.mutation_sequence = 0;
        self.backfill_queue.clear();
        self.queued_batches.clear();
        self.backfilling = false;
        self.discovery_time.clear();
        self.watch.clear();
        self.last_layout.clear();
    }

    fn activate(&mut self, ctx: &PluginContext<'_>) -> anyhow::Result<()> {
        self.validate_consistency = ctx.config().validate_consistency;
        self.show_text = ctx.config().show_text;
        self.show_images = ctx.config().show_images;
        self.sensitive_attributes = ctx.config().sensitive_attributes.clone();
        self.backfill = BackfillScheduler::new(ctx.config().time_to_yield);
        self.discover(ctx.pipeline())
    }

    fn teardown(&mut self, _ctx: &PluginContext<'_>) -> anyhow::Result<()> {
        self.backfill_queue.clear();
        self.queued_batches.clear();
        self.backfilling = false;
        self.watch.clear();
        // Clears the index annotation on every node still reachable through
        // the shadow document: a fresh, empty mirror has no annotations at
        // all.
        self.shadow = ShadowTree::new();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batcher::{Batcher, ZstdCompressor};
    use dom::fake::FakeTree;
    use wire::AgentConfig;

    fn harness() -> (LayoutTracker<FakeTree>, EventPipeline, Batcher) {
        let batcher = Batcher::spawn("tracker-test".to_string(), 64 * 1024, Box::new(ZstdCompressor::default()))
            .expect("spawn batcher");
        let pipeline = EventPipeline::new(batcher.handle());
        let tracker = LayoutTracker::new(FakeTree::new());
        (tracker, pipeline, batcher)
    }

    fn activate(tracker: &mut LayoutTracker<FakeTree>, pipeline: &EventPipeline) {
        activate_with_config(tracker, pipeline, &AgentConfig::default());
    }

    fn activate_with_config(tracker: &mut LayoutTracker<FakeTree>, pipeline: &EventPipeline, config: &AgentConfig) {
        let ctx = host::PluginContext::new(pipeline, config);
        Plugin::reset(tracker);
        Plugin::activate(tracker, &ctx).expect("activate");
        while !tracker.tick(pipeline).expect("tick") {}
    }

    #[test]
    fn appendchild_under_discovered_element_emits_single_insert() {
        let (mut tracker, pipeline, batcher) = harness();
        let live = tracker.live();
        let body;
        let div_a;
        {
            let mut tree = live.borrow_mut();
            let root = tree.root();
            body = tree.append_element(root, "body");
            div_a = tree.append_element(body, "div");
        }
        activate(&mut tracker, &pipeline);

        let span = live.borrow_mut().append_element(div_a, "span");
        tracker
            .on_mutation_batch(&pipeline, vec![MutationRecord::ChildList { target: div_a }])
            .expect("batch");

        let div_index = tracker.index_of(div_a).expect("div indexed");
        let span_index = tracker.index_of(span).expect("span indexed");
        assert_eq!(tracker.last_layout[&span_index].action, Action::Insert);
        assert_eq!(tracker.last_layout[&span_index].source, Source::Mutation);
        assert_eq!(tracker.last_layout[&span_index].parent, Some(div_index));
        batcher.shutdown(0).expect("shutdown");
    }

    #[test]
    fn attribute_mutation_emits_single_update_with_new_value() {
        let (mut tracker, pipeline, batcher) = harness();
        let live = tracker.live();
        let element;
        {
            let mut tree = live.borrow_mut();
            let root = tree.root();
            element = tree.append_element(root, "div");
            tree.set_attribute(element, "title", "x");
        }
        activate(&mut tracker, &pipeline);

        live.borrow_mut().set_attribute(element, "title", "y");
        tracker
            .on_mutation_batch(&pipeline, vec![MutationRecord::Attributes { target: element }])
            .expect("batch");

        let index = tracker.index_of(element).expect("indexed");
        let state = &tracker.last_layout[&index];
        assert_eq!(state.action, Action::Update);
        assert_eq!(state.attributes, vec![("title".to_string(), "y".to_string())]);
        batcher.shutdown(0).expect("shutdown");
    }

    #[test]
    fn scroll_respects_distance_threshold() {
        let (mut tracker, pipeline, batcher) = harness();
        let live = tracker.live();
        let scrollable;
        {
            let mut tree = live.borrow_mut();
            let root = tree.root();
            scrollable = tree.append_element(root, "div");
            tree.set_geometry(
                scrollable,
                LayoutGeometry { x: 0.0, y: 0.0, width: 10.0, height: 10.0, scroll_x: Some(0.0), scroll_y: Some(0.0) },
            );
        }
        activate(&mut tracker, &pipeline);
        let index = tracker.index_of(scrollable).expect("indexed");

        tracker.observe_scroll(&pipeline, index, 0.0, 3.0).expect("observe");
        assert!(!matches!(tracker.last_layout[&index].source, Source::Scroll));

        tracker.observe_scroll(&pipeline, index, 0.0, 10.0).expect("observe");
        assert!(matches!(tracker.last_layout[&index].source, Source::Scroll));
        batcher.shutdown(0).expect("shutdown");
    }

    #[test]
    fn second_consecutive_divergence_enters_degraded_mode_and_stops_applying() {
        let (mut tracker, pipeline, batcher) = harness();
        let live = tracker.live();
        let body;
        {
            let mut tree = live.borrow_mut();
            let root = tree.root();
            body = tree.append_element(root, "body");
        }
        activate(&mut tracker, &pipeline);

        // Two batches that each silently grow the live tree by a node the
        // tracker is never told about via a record naming that node's own
        // parent: nothing to classify, so the mirror's own shape stays
        // frozen while the live document moves on, diverging on each check.
        let ghost_parent = live.borrow_mut().append_element(body, "span");
        tracker.on_mutation_batch(&pipeline, vec![MutationRecord::ChildList { target: ghost_parent }]).expect("batch");
        live.borrow_mut().append_element(ghost_parent, "em");
        tracker.on_mutation_batch(&pipeline, vec![MutationRecord::ChildList { target: ghost_parent }]).expect("batch");

        assert!(tracker.is_degraded());
        batcher.shutdown(0).expect("shutdown");
    }

    #[test]
    fn out_of_order_records_in_one_batch_still_resolve_every_new_node() {
        let (mut tracker, pipeline, batcher) = harness();
        let live = tracker.live();
        let body;
        {
            let mut tree = live.borrow_mut();
            let root = tree.root();
            body = tree.append_element(root, "body");
        }
        activate(&mut tracker, &pipeline);

        let (div, span) = {
            let mut tree = live.borrow_mut();
            let div = tree.append_element(body, "div");
            let span = tree.append_element(div, "span");
            (div, span)
        };

        // div's own insertion under body is only discoverable from body's
        // ChildList record, but it is listed second here: span's record,
        // naming a parent with no shadow index yet, has to be retried once
        // div itself has been classified from the later record.
        tracker
            .on_mutation_batch(
                &pipeline,
                vec![MutationRecord::ChildList { target: div }, MutationRecord::ChildList { target: body }],
            )
            .expect("batch");

        let div_index = tracker.index_of(div).expect("div indexed");
        let span_index = tracker.index_of(span).expect("span indexed");
        assert_eq!(tracker.last_layout[&div_index].action, Action::Insert);
        assert_eq!(tracker.last_layout[&span_index].action, Action::Insert);
        assert_eq!(tracker.last_layout[&span_index].parent, Some(div_index));
        batcher.shutdown(0).expect("shutdown");
    }

    #[test]
    fn batches_queued_during_backfill_replay_in_arrival_order() {
        let (mut tracker, pipeline, batcher) = harness();
        let live = tracker.live();
        let root = live.borrow().root();
        let body;
        {
            let mut tree = live.borrow_mut();
            body = tree.append_element(root, "body");
        }

        // A zero-budget slice processes exactly one backfill item per tick
        // (see BackfillScheduler::tick), so activation alone leaves backfill
        // in progress without any tick being driven yet.
        let config = AgentConfig { time_to_yield: std::time::Duration::from_millis(0), ..AgentConfig::default() };
        let ctx = host::PluginContext::new(&pipeline, &config);
        Plugin::reset(&mut tracker);
        Plugin::activate(&mut tracker, &ctx).expect("activate");
        assert!(tracker.is_backfilling());

        // Two batches queue while backfill is still draining. The second
        // names a node whose shadow index only exists once the first batch
        // has been replayed: out of arrival order, its candidate would find
        // an un-shadowed parent and get silently dropped instead of deferred
        // (each queued batch runs its own independent fixed point).
        let child = live.borrow_mut().append_element(body, "div");
        tracker.on_mutation_batch(&pipeline, vec![MutationRecord::ChildList { target: body }]).expect("batch 1");
        let grandchild = live.borrow_mut().append_element(child, "span");
        tracker.on_mutation_batch(&pipeline, vec![MutationRecord::ChildList { target: child }]).expect("batch 2");

        while !tracker.tick(&pipeline).expect("tick") {}

        assert!(tracker.index_of(child).is_some(), "first queued batch must have replayed");
        assert!(tracker.index_of(grandchild).is_some(), "second queued batch depends on the first replaying first");
        batcher.shutdown(0).expect("shutdown");
    }

    #[test]
    fn content_capture_policy_redacts_text_and_omits_sensitive_attributes() {
        let (mut tracker, pipeline, batcher) = harness();
        let live = tracker.live();
        let div;
        let text;
        {
            let mut tree = live.borrow_mut();
            let root = tree.root();
            div = tree.append_element(root, "div");
            tree.set_attribute(div, "password", "hunter2");
            tree.set_attribute(div, "title", "kept");
            text = tree.append_text(div, "secret message");
        }
        let config = AgentConfig {
            show_text: false,
            sensitive_attributes: vec!["password".to_string()],
            ..AgentConfig::default()
        };
        activate_with_config(&mut tracker, &pipeline, &config);

        let div_index = tracker.index_of(div).expect("div indexed");
        let text_index = tracker.index_of(text).expect("text indexed");

        let div_state = &tracker.last_layout[&div_index];
        assert!(!div_state.attributes.iter().any(|(key, _)| key == "password"));
        assert!(div_state.attributes.iter().any(|(key, _)| key == "title"));
        assert!(matches!(tracker.last_layout[&text_index].layout, LayoutPayload::Redacted));
        batcher.shutdown(0).expect("shutdown");
    }

    #[test]
    fn show_images_false_redacts_image_elements() {
        let (mut tracker, pipeline, batcher) = harness();
        let live = tracker.live();
        let img;
        {
            let mut tree = live.borrow_mut();
            let root = tree.root();
            img = tree.append_element(root, "img");
        }
        let config = AgentConfig { show_images: false, ..AgentConfig::default() };
        activate_with_config(&mut tracker, &pipeline, &config);

        let index = tracker.index_of(img).expect("img indexed");
        assert!(matches!(tracker.last_layout[&index].layout, LayoutPayload::Redacted));
        batcher.shutdown(0).expect("shutdown");
    }
}
