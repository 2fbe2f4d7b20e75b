//! Top-level wiring: one `Session` per impression, assembling the Event
//! Pipeline, the background Batcher, the Plugin Host, and the Layout
//! Tracker into the single entry point an embedding calls into.
//!
//! Analogous to the teacher's own top-level crate gluing independently
//! testable subsystems (DOM, style, render mirrors) into one page object —
//! here it is the DOM mirror, the wire format, and the event bus instead.

use std::cell::RefCell;
use std::rc::Rc;

use batcher::{Batcher, ZstdCompressor};
use dom::{LiveTree, MutationRecord, NodeIndex};
use host::{Plugin, PluginContext, PluginHost};
use pipeline::EventPipeline;
use tracker::LayoutTracker;
use wire::AgentConfig;

/// Adapts a shared [`LayoutTracker`] to the [`host::Plugin`] capability set,
/// so the host's lifecycle (reset/activate/teardown) and `Session`'s own
/// typed entry points (mutation batches, scroll/input samples, backfill
/// ticks) drive the very same tracker instance.
struct TrackerPlugin<L: LiveTree>(Rc<RefCell<LayoutTracker<L>>>);

impl<L: LiveTree> Plugin for TrackerPlugin<L> {
    fn name(&self) -> &'static str {
        "layout"
    }

    fn reset(&mut self) {
        self.0.borrow_mut().reset();
    }

    fn activate(&mut self, ctx: &PluginContext<'_>) -> anyhow::Result<()> {
        self.0.borrow_mut().activate(ctx)
    }

    fn teardown(&mut self, ctx: &PluginContext<'_>) -> anyhow::Result<()> {
        self.0.borrow_mut().teardown(ctx)
    }
}

/// One impression's worth of wiring: the foreground pipeline, the
/// background batcher thread, the plugin host, and the Layout Tracker.
///
/// Generic over [`LiveTree`] so the same wiring drives a real browser
/// embedding or, in this crate's own tests, [`dom::fake::FakeTree`].
pub struct Session<L: LiveTree> {
    pipeline: EventPipeline,
    host: PluginHost,
    tracker: Rc<RefCell<LayoutTracker<L>>>,
    batcher: Batcher,
}

impl<L: LiveTree + 'static> Session<L> {
    /// Builds a session over `live`, spawning the background Batcher thread
    /// and registering the Layout Tracker with a fresh [`PluginHost`].
    /// Nothing observes the document until [`Self::start`] is called.
    ///
    /// # Errors
    /// Returns an error if the dedicated Batcher runtime fails to start.
    pub fn new(config: AgentConfig, live: L) -> anyhow::Result<Self> {
        let impression_id = uuid_like_id();
        let batcher = Batcher::spawn(impression_id, config.batch_limit, Box::new(ZstdCompressor::default()))?;
        let pipeline = EventPipeline::new(batcher.handle());
        let tracker = Rc::new(RefCell::new(LayoutTracker::new(live)));
        let mut host = PluginHost::new(config);
        host.register(Box::new(TrackerPlugin(Rc::clone(&tracker))));
        Ok(Self { pipeline, host, tracker, batcher })
    }

    /// Builds a session from `CLARITY_*` environment variables.
    ///
    /// # Errors
    /// Returns an error if the dedicated Batcher runtime fails to start.
    pub fn from_env(live: L) -> anyhow::Result<Self> {
        Self::new(AgentConfig::from_env(), live)
    }

    /// The event bus this session's plugins report through.
    #[must_use]
    pub fn pipeline(&self) -> &EventPipeline {
        &self.pipeline
    }

    /// `true` once discovery has run and the Layout Tracker is observing.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.host.is_started()
    }

    /// Resets every registered plugin, then discovers the live document and
    /// activates. Refuses (and reports `ClarityDuplicated`) on a session
    /// already started.
    ///
    /// # Errors
    /// Propagates a duplicate-start refusal or a plugin activation failure.
    pub fn start(&mut self) -> anyhow::Result<()> {
        self.host.start(&self.pipeline)
    }

    /// Tears every plugin down. A no-op if the session was never started.
    ///
    /// # Errors
    /// Propagates the first plugin teardown failure.
    pub fn stop(&mut self) -> anyhow::Result<()> {
        self.host.stop(&self.pipeline)
    }

    /// Drains the Layout Tracker's asynchronous backfill, processing one
    /// bounded time slice per call.
    ///
    /// # Errors
    /// Propagates the first event-forwarding failure.
    pub fn tick_backfill(&self) -> anyhow::Result<bool> {
        self.tracker.borrow_mut().tick(&self.pipeline)
    }

    /// Ingests one mutation-observer-shaped batch for the Layout Tracker.
    ///
    /// # Errors
    /// Propagates the first event-forwarding failure.
    pub fn on_mutation_batch(&self, records: Vec<MutationRecord<L::Handle>>) -> anyhow::Result<()> {
        self.tracker.borrow_mut().on_mutation_batch(&self.pipeline, records)
    }

    /// Feeds an observed scroll sample to the Layout Tracker's watch
    /// registry.
    ///
    /// # Errors
    /// Propagates the first event-forwarding failure.
    pub fn observe_scroll(&self, index: NodeIndex, scroll_x: f64, scroll_y: f64) -> anyhow::Result<()> {
        self.tracker.borrow_mut().observe_scroll(&self.pipeline, index, scroll_x, scroll_y)
    }

    /// Feeds an observed input/change sample to the Layout Tracker's watch
    /// registry.
    ///
    /// # Errors
    /// Propagates the first event-forwarding failure.
    pub fn observe_input(&self, index: NodeIndex) -> anyhow::Result<()> {
        self.tracker.borrow_mut().observe_input(&self.pipeline, index)
    }

    /// The stable index assigned to a live handle, if the Layout Tracker has
    /// discovered or classified it yet.
    #[must_use]
    pub fn index_of(&self, handle: L::Handle) -> Option<NodeIndex> {
        self.tracker.borrow().index_of(handle)
    }

    /// A cloned handle to the live document this session observes.
    #[must_use]
    pub fn live(&self) -> Rc<RefCell<L>> {
        self.tracker.borrow().live()
    }

    /// `true` once the Layout Tracker has seen two consecutive shadow/live
    /// divergences and stopped applying further mutation batches.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.tracker.borrow().is_degraded()
    }

    /// Forces the background Batcher to flush whatever it has accumulated so
    /// far, without waiting for the batch-size threshold.
    ///
    /// # Errors
    /// Returns an error if the background worker has already exited.
    pub fn force_compression(&self, time: u64) -> anyhow::Result<()> {
        self.batcher.force_compression(time)
    }

    /// Drains one compressed batch the background worker has produced, if
    /// any, without blocking.
    pub fn try_recv_batch(&mut self) -> Option<wire::CompressedBatch> {
        self.batcher.try_recv_batch()
    }

    /// Tears plugins down (idempotently) and performs the Batcher's hard
    /// stop: flush, close the channel, join the background thread.
    ///
    /// # Errors
    /// Propagates a plugin teardown failure or a background-thread panic.
    pub fn shutdown(mut self, time: u64) -> anyhow::Result<()> {
        self.host.stop(&self.pipeline)?;
        self.batcher.shutdown(time)
    }
}

/// A session-unique id good enough to tag an impression's batches.
///
/// Not a true UUID: the wire format only requires an opaque string the
/// collector can group batches by, and pulling in a UUID crate for one
/// field would widen the dependency surface for no behavioral gain.
fn uuid_like_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let sequence = COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();
    format!("impression-{pid}-{sequence}")
}

/// Initializes `env_logger` for an embedding that wants this crate's
/// `log::*` output surfaced. Safe to call more than once; a second call is
/// a no-op rather than a panic.
pub fn init_logging() {
    let _ = env_logger::try_init();
}
