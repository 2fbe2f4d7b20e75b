//! The background worker loop: accumulates events, flushes on size or
//! demand, and applies the single-XHR-error suppression rule.

use tokio::sync::mpsc;

use wire::{CompressedBatch, Envelope, Event, InstrumentationKind, Payload};

use crate::command::BatcherCommand;
use crate::compressor::Compressor;

struct BatchState {
    impression_id: String,
    sequence: u64,
    batch_limit: usize,
    events: Vec<Event>,
    bytes: usize,
    is_single_xhr_error_event: bool,
}

impl BatchState {
    fn new(impression_id: String, batch_limit: usize) -> Self {
        Self { impression_id, sequence: 0, batch_limit, events: Vec::new(), bytes: 0, is_single_xhr_error_event: false }
    }

    fn reset(&mut self) {
        self.events.clear();
        self.bytes = 0;
        self.is_single_xhr_error_event = false;
    }

    fn push(&mut self, event: Event, serialized_len: usize) {
        self.events.push(event);
        self.bytes += serialized_len;
        self.is_single_xhr_error_event =
            self.events.len() == 1 && self.events[0].event_type == InstrumentationKind::XhrError.wire_type();
    }
}

/// Runs until `commands` closes (the foreground dropped its sender), then
/// returns so the dedicated thread can exit.
pub async fn run(
    impression_id: String,
    batch_limit: usize,
    compressor: Box<dyn Compressor>,
    mut commands: mpsc::UnboundedReceiver<BatcherCommand>,
    output: mpsc::UnboundedSender<CompressedBatch>,
) {
    let mut state = BatchState::new(impression_id, batch_limit);
    while let Some(command) = commands.recv().await {
        match command {
            BatcherCommand::AddEvent(event, time) => {
                handle_add_event(&mut state, compressor.as_ref(), &output, event, time);
            }
            BatcherCommand::ForceCompression(time) => {
                flush(&mut state, compressor.as_ref(), &output, time);
            }
        }
    }
    log::debug!("batcher worker exiting: command channel closed");
}

fn handle_add_event(
    state: &mut BatchState,
    compressor: &dyn Compressor,
    output: &mpsc::UnboundedSender<CompressedBatch>,
    event: Event,
    time: u64,
) {
    let serialized = match serde_json::to_string(&event) {
        Ok(serialized) => serialized,
        Err(error) => {
            log::error!("batcher: failed to serialize event {:?}: {error}", event.id);
            return;
        }
    };
    let length = serialized.len();

    if state.bytes > 0 && state.bytes + length > state.batch_limit {
        flush(state, compressor, output, time);
    }

    state.push(event, length);

    if state.bytes >= state.batch_limit {
        flush(state, compressor, output, time);
    }
}

fn flush(state: &mut BatchState, compressor: &dyn Compressor, output: &mpsc::UnboundedSender<CompressedBatch>, time: u64) {
    if state.bytes == 0 {
        return;
    }
    if state.is_single_xhr_error_event {
        log::debug!("batcher: dropping lone XhrError batch to avoid a failure-reporting loop");
        state.reset();
        return;
    }

    let envelope = Envelope { impression_id: state.impression_id.clone(), sequence_number: state.sequence, time };
    let metadata = (state.sequence == 0).then(|| serde_json::json!({ "impression_id": state.impression_id }));
    let event_count = state.events.len();
    let payload = Payload { envelope, metadata, events: std::mem::take(&mut state.events) };

    let raw_data = match serde_json::to_string(&payload) {
        Ok(raw_data) => raw_data,
        Err(error) => {
            log::error!("batcher: failed to serialize payload for sequence {}: {error}", state.sequence);
            state.reset();
            return;
        }
    };

    match compressor.compress(raw_data.as_bytes()) {
        Ok(compressed_data) => {
            let batch = CompressedBatch { compressed_data, raw_data, event_count, sequence_number: state.sequence };
            if output.send(batch).is_err() {
                log::warn!("batcher: foreground receiver dropped, batch {} lost", state.sequence);
            }
            state.sequence += 1;
        }
        Err(error) => {
            log::error!("batcher: compression failed for sequence {}: {error}", state.sequence);
        }
    }
    state.reset();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compressor::ZstdCompressor;
    use wire::{EventId, Origin};

    fn event(id: u64, event_type: &str) -> Event {
        Event::new(EventId::from_raw(id), Origin::Instrumentation, event_type, 0, serde_json::json!({}))
    }

    #[tokio::test]
    async fn lone_xhr_error_batch_is_suppressed() {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (output_tx, mut output_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(
            "impression-1".to_string(),
            1024,
            Box::new(ZstdCompressor::default()),
            command_rx,
            output_tx,
        ));

        command_tx
            .send(BatcherCommand::AddEvent(event(0, "XhrError"), 10))
            .expect("send");
        command_tx.send(BatcherCommand::ForceCompression(11)).expect("send");
        drop(command_tx);
        handle.await.expect("worker task");

        assert!(output_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn sequence_numbers_increase_without_gaps() {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (output_tx, mut output_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(
            "impression-2".to_string(),
            1024,
            Box::new(ZstdCompressor::default()),
            command_rx,
            output_tx,
        ));

        for i in 0..3u64 {
            command_tx.send(BatcherCommand::AddEvent(event(i, "Insert"), i)).expect("send");
            command_tx.send(BatcherCommand::ForceCompression(i)).expect("send");
        }
        drop(command_tx);
        handle.await.expect("worker task");

        let mut sequences = Vec::new();
        while let Ok(batch) = output_rx.try_recv() {
            sequences.push(batch.sequence_number);
        }
        assert_eq!(sequences, vec![0, 1, 2]);
    }
}
