//! Event identity, origin, and the bijective struct/array wire projection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A monotonically-increasing event identifier, unique within a session.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct EventId(u64);

impl EventId {
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Builds an id from a raw value, bypassing the session allocator.
    ///
    /// Only meant for deserializing ids that already exist on the wire (or
    /// for tests); normal production code allocates ids from
    /// [`EventIdAllocator`] and should never need this.
    #[inline]
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mints fresh, never-reused [`EventId`] values for one session.
#[derive(Debug, Default)]
pub struct EventIdAllocator {
    next: u64,
}

impl EventIdAllocator {
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Allocates a single id.
    pub fn allocate(&mut self) -> EventId {
        let id = EventId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }

    /// Allocates `count` contiguous ids, preserving the order a caller will
    /// zip them against a list of events.
    pub fn allocate_many(&mut self, count: usize) -> Vec<EventId> {
        (0..count).map(|_| self.allocate()).collect()
    }
}

/// Who produced an event: a named plugin, or the pipeline's own
/// instrumentation channel.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Origin {
    Plugin(String),
    Instrumentation,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plugin(name) => write!(f, "plugin:{name}"),
            Self::Instrumentation => write!(f, "instrumentation"),
        }
    }
}

/// Failure parsing an [`Origin`] back out of its wire string form.
#[derive(Debug)]
pub struct OriginParseError(String);

impl fmt::Display for OriginParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a valid event origin: {:?}", self.0)
    }
}

impl std::error::Error for OriginParseError {}

impl FromStr for Origin {
    type Err = OriginParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "instrumentation" {
            Ok(Self::Instrumentation)
        } else if let Some(name) = s.strip_prefix("plugin:") {
            Ok(Self::Plugin(name.to_string()))
        } else {
            Err(OriginParseError(s.to_string()))
        }
    }
}

/// The closed set of diagnostic shapes the core itself ever emits.
///
/// Concrete plugin event shapes (pointer, performance, viewport, JS-error
/// payload contents) are carried as opaque `data` and are not enumerated
/// here; this set covers only what the core components instrument.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum InstrumentationKind {
    JsError,
    XhrError,
    ShadowDomInconsistent,
    ClarityDuplicated,
    PerformanceStateError,
    NavigationTiming,
    ResourceTiming,
}

impl InstrumentationKind {
    #[must_use]
    pub const fn wire_type(self) -> &'static str {
        match self {
            Self::JsError => "JsError",
            Self::XhrError => "XhrError",
            Self::ShadowDomInconsistent => "ShadowDomInconsistent",
            Self::ClarityDuplicated => "ClarityDuplicated",
            Self::PerformanceStateError => "PerformanceStateError",
            Self::NavigationTiming => "NavigationTiming",
            Self::ResourceTiming => "ResourceTiming",
        }
    }
}

/// One event on the bus: a layout change, a plugin observation, or an
/// instrumentation record, all sharing the same envelope shape.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(try_from = "WireEvent", into = "WireEvent")]
pub struct Event {
    pub id: EventId,
    pub origin: Origin,
    pub event_type: String,
    pub time: u64,
    pub data: serde_json::Value,
}

impl Event {
    #[must_use]
    pub fn new(id: EventId, origin: Origin, event_type: impl Into<String>, time: u64, data: serde_json::Value) -> Self {
        Self { id, origin, event_type: event_type.into(), time, data }
    }
}

/// The `[id, origin, type, time, data]` positional projection used on the
/// wire. Struct and array forms carry identical information; this type only
/// exists as the serde conversion target for [`Event`].
#[derive(Clone, Serialize, Deserialize)]
struct WireEvent(u64, String, String, u64, serde_json::Value);

impl From<Event> for WireEvent {
    fn from(event: Event) -> Self {
        Self(event.id.get(), event.origin.to_string(), event.event_type, event.time, event.data)
    }
}

impl TryFrom<WireEvent> for Event {
    type Error = OriginParseError;

    fn try_from(wire: WireEvent) -> Result<Self, Self::Error> {
        let WireEvent(id, origin, event_type, time, data) = wire;
        Ok(Self { id: EventId(id), origin: origin.parse()?, event_type, time, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_round_trips_through_array_projection() {
        let event = Event::new(
            EventId(7),
            Origin::Plugin("layout".to_string()),
            "Insert",
            1_000,
            serde_json::json!({ "index": 3 }),
        );
        let wire = serde_json::to_string(&event).expect("serialize");
        let back: Event = serde_json::from_str(&wire).expect("deserialize");
        assert_eq!(event, back);
    }

    #[test]
    fn id_allocator_preserves_order_for_batches() {
        let mut allocator = EventIdAllocator::new();
        let ids = allocator.allocate_many(3);
        assert_eq!(ids, vec![EventId(0), EventId(1), EventId(2)]);
    }

    #[test]
    fn origin_round_trips_through_display_and_parse() {
        let plugin: Origin = "plugin:pointer".parse().expect("parses");
        assert_eq!(plugin.to_string(), "plugin:pointer");
        let instrumentation: Origin = "instrumentation".parse().expect("parses");
        assert_eq!(instrumentation, Origin::Instrumentation);
    }
}
