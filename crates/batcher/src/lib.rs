//! The background compression context: a dedicated OS thread running its
//! own single-threaded Tokio runtime, so accumulating, framing, and
//! compressing events can never jank the foreground.

mod command;
mod compressor;
mod worker;

use std::thread::JoinHandle;

use tokio::sync::mpsc;

pub use command::BatcherCommand;
pub use compressor::{Compressor, ZstdCompressor};
use wire::{CompressedBatch, Event};

/// A cheap, cloneable sender half of a running [`Batcher`].
///
/// Foreground code (the Event Pipeline) only ever enqueues work; it never
/// drains compressed batches, so it is handed this instead of the full
/// [`Batcher`], which also owns the receiving half and the thread join.
#[derive(Clone)]
pub struct BatcherHandle {
    command_tx: mpsc::UnboundedSender<BatcherCommand>,
}

impl BatcherHandle {
    /// Enqueues an event for the background worker to accumulate.
    ///
    /// # Errors
    /// Returns an error if the background worker has already exited.
    pub fn add_event(&self, event: Event, time: u64) -> anyhow::Result<()> {
        self.command_tx
            .send(BatcherCommand::AddEvent(event, time))
            .map_err(|_| anyhow::anyhow!("batcher worker has exited"))
    }

    /// Forces an immediate flush of whatever is currently accumulated.
    ///
    /// # Errors
    /// Returns an error if the background worker has already exited.
    pub fn force_compression(&self, time: u64) -> anyhow::Result<()> {
        self.command_tx
            .send(BatcherCommand::ForceCompression(time))
            .map_err(|_| anyhow::anyhow!("batcher worker has exited"))
    }
}

/// A handle to the running background worker. Dropping it closes the
/// command channel, which lets the worker drain and the thread exit; callers
/// that need a deterministic join should call [`Batcher::shutdown`] instead.
pub struct Batcher {
    command_tx: mpsc::UnboundedSender<BatcherCommand>,
    batch_rx: mpsc::UnboundedReceiver<CompressedBatch>,
    thread: Option<JoinHandle<()>>,
}

impl Batcher {
    /// Spawns the background thread and its runtime.
    ///
    /// # Errors
    /// Returns an error if the dedicated Tokio runtime fails to start.
    pub fn spawn(impression_id: String, batch_limit: usize, compressor: Box<dyn Compressor>) -> anyhow::Result<Self> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (batch_tx, batch_rx) = mpsc::unbounded_channel();

        let thread = std::thread::Builder::new()
            .name("telemetry-batcher".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread().enable_time().build() {
                    Ok(runtime) => runtime,
                    Err(error) => {
                        log::error!("batcher: failed to start background runtime: {error}");
                        return;
                    }
                };
                runtime.block_on(worker::run(impression_id, batch_limit, compressor, command_rx, batch_tx));
            })
            .map_err(|error| anyhow::anyhow!("failed to spawn batcher thread: {error}"))?;

        Ok(Self { command_tx, batch_rx, thread: Some(thread) })
    }

    /// A cloneable sender-only handle, for the foreground Event Pipeline.
    #[must_use]
    pub fn handle(&self) -> BatcherHandle {
        BatcherHandle { command_tx: self.command_tx.clone() }
    }

    /// Enqueues an event for the background worker to accumulate.
    ///
    /// # Errors
    /// Returns an error if the background worker has already exited.
    pub fn add_event(&self, event: Event, time: u64) -> anyhow::Result<()> {
        self.handle().add_event(event, time)
    }

    /// Forces an immediate flush of whatever is currently accumulated.
    ///
    /// # Errors
    /// Returns an error if the background worker has already exited.
    pub fn force_compression(&self, time: u64) -> anyhow::Result<()> {
        self.handle().force_compression(time)
    }

    /// Drains any batches the worker has produced so far, without blocking.
    pub fn try_recv_batch(&mut self) -> Option<CompressedBatch> {
        self.batch_rx.try_recv().ok()
    }

    /// Flushes whatever remains, then closes the channel and joins the
    /// background thread — the "hard stop" path from teardown.
    ///
    /// # Errors
    /// Returns an error if the background thread panicked.
    pub fn shutdown(self, time: u64) -> anyhow::Result<()> {
        let _ = self.force_compression(time);
        let Self { command_tx, batch_rx: _, thread } = self;
        drop(command_tx);
        if let Some(thread) = thread {
            thread.join().map_err(|_| anyhow::anyhow!("batcher thread panicked"))?;
        }
        Ok(())
    }
}
