//! Cooperative, bounded-time-slice draining of the backfill queue — the
//! model for "upgrade placeholder layouts asynchronously" without a real
//! browser event loop to yield back to between ticks.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Drains a queue in bounded slices. Each `tick` processes items until
/// `time_to_yield` elapses, then returns, leaving whatever is left for the
/// next tick. The caller (the host's own scheduling loop, or a test driving
/// it directly) decides when the next tick happens.
pub struct BackfillScheduler {
    time_to_yield: Duration,
}

impl BackfillScheduler {
    #[must_use]
    pub const fn new(time_to_yield: Duration) -> Self {
        Self { time_to_yield }
    }

    /// Processes `queue` until either it drains or the slice's deadline
    /// passes. Returns `true` if the queue is empty when it returns.
    pub fn tick<T>(&self, queue: &mut VecDeque<T>, mut process: impl FnMut(T)) -> bool {
        let deadline = Instant::now() + self.time_to_yield;
        while let Some(item) = queue.pop_front() {
            process(item);
            if Instant::now() >= deadline {
                return queue.is_empty();
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_whole_queue_when_each_item_is_instant() {
        let scheduler = BackfillScheduler::new(Duration::from_millis(50));
        let mut queue: VecDeque<u32> = (0..5).collect();
        let mut seen = Vec::new();
        let drained = scheduler.tick(&mut queue, |item| seen.push(item));
        assert!(drained);
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn a_zero_budget_slice_still_processes_at_least_one_item() {
        let scheduler = BackfillScheduler::new(Duration::from_millis(0));
        let mut queue: VecDeque<u32> = (0..3).collect();
        let mut seen = Vec::new();
        let drained = scheduler.tick(&mut queue, |item| seen.push(item));
        assert_eq!(seen.len(), 1);
        assert!(!drained);
        assert_eq!(queue.len(), 2);
    }
}
