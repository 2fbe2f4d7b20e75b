//! The message shapes sent across the foreground/background channel.

use wire::Event;

/// A command delivered to the background worker, in the order the
/// foreground issued it.
#[derive(Debug)]
pub enum BatcherCommand {
    AddEvent(Event, u64),
    ForceCompression(u64),
}
