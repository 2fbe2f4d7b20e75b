//! The framing the Batcher wraps around a group of events before handing it
//! to an uploader, plus the compressed form that crosses back to the
//! foreground.

use serde::{Deserialize, Serialize};

use crate::event::Event;

/// Per-batch framing. `sequence_number` is the batch's position in the
/// session, starting at zero and increasing without gaps.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub impression_id: String,
    pub sequence_number: u64,
    pub time: u64,
}

/// The uncompressed shape shipped to the collector. `metadata` is only
/// populated on the first batch of a session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payload {
    pub envelope: Envelope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub events: Vec<Event>,
}

/// A flushed, compressed batch handed back from the background context to
/// the foreground for upload.
#[derive(Clone, Debug)]
pub struct CompressedBatch {
    pub compressed_data: Vec<u8>,
    /// Retained only so a failed upload has a fallback payload to retry
    /// with; never re-derived from `compressed_data`.
    pub raw_data: String,
    pub event_count: usize,
    pub sequence_number: u64,
}
