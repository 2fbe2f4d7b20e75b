//! Wire types shared by every other crate in the workspace: events, the
//! batch envelope, and agent configuration. Deliberately independent of
//! `dom` — events carry opaque JSON payloads, so this crate has no opinion
//! on what a plugin's concrete data shape looks like.

pub mod config;
pub mod envelope;
pub mod event;

pub use config::AgentConfig;
pub use envelope::{CompressedBatch, Envelope, Payload};
pub use event::{Event, EventId, EventIdAllocator, InstrumentationKind, Origin, OriginParseError};
