//! The foreground Event Pipeline: monotonic event-id assignment,
//! timestamping, the instrumentation channel every component's anomalies
//! flow through, and forwarding to the background Batcher.
//!
//! Runs entirely on the page's event loop (single-threaded, cooperative);
//! nothing here blocks. State is plain interior mutability (`RefCell`), not
//! a mutex, because nothing outside the foreground ever touches it.

mod bind;
mod clock;

use std::cell::RefCell;

pub use bind::{BindRegistry, BoundListener, HandlerToken};
pub use clock::SessionClock;

use batcher::BatcherHandle;
use wire::{Event, EventId, EventIdAllocator, InstrumentationKind, Origin};

/// An event not yet stamped with an id or (necessarily) a timestamp.
///
/// Plugins build one of these and hand it to [`EventPipeline::add_event`];
/// the pipeline completes it rather than trusting the caller's id or time.
#[derive(Clone, Debug)]
pub struct PartialEvent {
    pub origin: Origin,
    pub event_type: String,
    pub time: Option<u64>,
    pub data: serde_json::Value,
}

impl PartialEvent {
    #[must_use]
    pub fn new(origin: Origin, event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self { origin, event_type: event_type.into(), time: None, data }
    }

    /// Pins an explicit timestamp (e.g. a backfilled layout's discovery
    /// time) instead of letting `add_event` stamp it with "now".
    #[must_use]
    pub const fn at(mut self, time: u64) -> Self {
        self.time = Some(time);
        self
    }
}

/// The in-page event bus. One instance per impression.
pub struct EventPipeline {
    ids: RefCell<EventIdAllocator>,
    clock: SessionClock,
    batcher: BatcherHandle,
    bind: RefCell<BindRegistry>,
}

impl EventPipeline {
    #[must_use]
    pub fn new(batcher: BatcherHandle) -> Self {
        Self {
            ids: RefCell::new(EventIdAllocator::new()),
            clock: SessionClock::new(),
            batcher,
            bind: RefCell::new(BindRegistry::new()),
        }
    }

    /// High-resolution milliseconds since session start when `relative`,
    /// wall-clock milliseconds since the epoch otherwise.
    #[must_use]
    pub fn get_timestamp(&self, relative: bool) -> u64 {
        self.clock.timestamp(relative)
    }

    /// Completes `partial` with a fresh id and, if unset, the current
    /// wall-clock time, then forwards it to the Batcher.
    ///
    /// # Errors
    /// Returns an error if the background worker has already exited.
    pub fn add_event(&self, partial: PartialEvent) -> anyhow::Result<Event> {
        let id = self.ids.borrow_mut().allocate();
        self.stamp_and_forward(id, partial)
    }

    /// Completes a whole list in order, allocating contiguous ids so a
    /// receiver can tell the batch was produced by one call.
    ///
    /// # Errors
    /// Returns an error on the first event the Batcher refuses; events
    /// before it have already been forwarded.
    pub fn add_multiple_events(&self, partials: Vec<PartialEvent>) -> anyhow::Result<Vec<Event>> {
        let ids = self.ids.borrow_mut().allocate_many(partials.len());
        ids.into_iter().zip(partials).map(|(id, partial)| self.stamp_and_forward(id, partial)).collect()
    }

    /// Wraps a diagnostic record in a standard event, attributed to
    /// [`Origin::Instrumentation`], and forwards it like any other event.
    ///
    /// # Errors
    /// Returns an error if the background worker has already exited.
    pub fn instrument(&self, kind: InstrumentationKind, data: serde_json::Value) -> anyhow::Result<Event> {
        self.add_event(PartialEvent::new(Origin::Instrumentation, kind.wire_type(), data))
    }

    /// Records a listener so `unbind_all` can remove it at teardown.
    pub fn bind(&self, target: impl Into<String>, event_type: impl Into<String>) -> HandlerToken {
        self.bind.borrow_mut().bind(target, event_type)
    }

    /// Unbinds every listener recorded so far, as teardown does.
    pub fn unbind_all(&self) -> Vec<BoundListener> {
        self.bind.borrow_mut().unbind_all()
    }

    fn stamp_and_forward(&self, id: EventId, partial: PartialEvent) -> anyhow::Result<Event> {
        let time = partial.time.unwrap_or_else(|| self.get_timestamp(false));
        let event = Event::new(id, partial.origin, partial.event_type, time, partial.data);
        log::trace!("pipeline: forwarding event id={id} origin={} type={}", event.origin, event.event_type);
        self.batcher.add_event(event.clone(), time)?;
        Ok(event)
    }
}
