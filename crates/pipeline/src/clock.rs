//! Timestamps: high-resolution milliseconds since session start, or
//! wall-clock milliseconds since the epoch.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Anchors a session's relative timestamps to the instant it was built.
pub struct SessionClock {
    start: Instant,
}

impl SessionClock {
    #[must_use]
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    /// Milliseconds since the Unix epoch. `0` on a clock that somehow reads
    /// before the epoch, which never happens outside of a mocked clock.
    #[must_use]
    pub fn wall_clock_ms() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map(|elapsed| elapsed.as_millis() as u64).unwrap_or(0)
    }

    /// Milliseconds elapsed since this clock (and so its session) started.
    #[must_use]
    pub fn relative_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// `relative_ms()` when `relative`, `wall_clock_ms()` otherwise — the two
    /// forms `EventPipeline::get_timestamp` exposes.
    #[must_use]
    pub fn timestamp(&self, relative: bool) -> u64 {
        if relative {
            self.relative_ms()
        } else {
            Self::wall_clock_ms()
        }
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_time_starts_near_zero() {
        let clock = SessionClock::new();
        assert!(clock.relative_ms() < 1000);
    }

    #[test]
    fn wall_clock_is_after_the_epoch() {
        assert!(SessionClock::wall_clock_ms() > 0);
    }
}
