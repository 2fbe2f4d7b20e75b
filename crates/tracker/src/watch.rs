//! Watch bindings: scroll/input listener bookkeeping, modeling the
//! at-most-once-per-index DOM listeners a browser embedding would attach.

use std::collections::{HashMap, HashSet};

use dom::NodeIndex;

/// Euclidean distance, in pixels, a scroll sample must exceed (relative to
/// the last *emitted* position, not the last observed one) to be accepted.
const SCROLL_THRESHOLD_PX: f64 = 5.0;

#[derive(Default)]
pub struct WatchRegistry {
    watched_scroll: HashSet<NodeIndex>,
    watched_input: HashSet<NodeIndex>,
    last_emitted_scroll: HashMap<NodeIndex, (f64, f64)>,
}

impl WatchRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a scroll watch for `index`, idempotently. `initial` seeds
    /// the baseline the first real sample is compared against.
    pub fn watch_scroll(&mut self, index: NodeIndex, initial: (f64, f64)) {
        if self.watched_scroll.insert(index) {
            self.last_emitted_scroll.insert(index, initial);
        }
    }

    /// Registers an input/change watch for `index`, idempotently.
    pub fn watch_input(&mut self, index: NodeIndex) {
        self.watched_input.insert(index);
    }

    #[must_use]
    pub fn is_watching_input(&self, index: NodeIndex) -> bool {
        self.watched_input.contains(&index)
    }

    /// Applies the distance-throttle rule: `true` iff this sample is farther
    /// than the threshold from the last *emitted* position, in which case it
    /// becomes the new baseline. A node with no scroll watch is rejected.
    pub fn accept_scroll(&mut self, index: NodeIndex, scroll_x: f64, scroll_y: f64) -> bool {
        if !self.watched_scroll.contains(&index) {
            return false;
        }
        let exceeds = match self.last_emitted_scroll.get(&index) {
            Some(&(last_x, last_y)) => {
                let delta_x = scroll_x - last_x;
                let delta_y = scroll_y - last_y;
                delta_x.mul_add(delta_x, delta_y * delta_y) > SCROLL_THRESHOLD_PX * SCROLL_THRESHOLD_PX
            }
            None => true,
        };
        if exceeds {
            self.last_emitted_scroll.insert(index, (scroll_x, scroll_y));
        }
        exceeds
    }

    pub fn clear(&mut self) {
        self.watched_scroll.clear();
        self.watched_input.clear();
        self.last_emitted_scroll.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(raw: u64) -> NodeIndex {
        serde_json::from_value(serde_json::json!(raw)).expect("decode index")
    }

    #[test]
    fn small_scroll_is_suppressed_but_large_scroll_is_not() {
        let mut watch = WatchRegistry::new();
        let node = index(3);
        watch.watch_scroll(node, (0.0, 0.0));

        assert!(!watch.accept_scroll(node, 0.0, 3.0));
        assert!(watch.accept_scroll(node, 0.0, 10.0));
    }

    #[test]
    fn threshold_compares_against_last_emitted_not_last_observed() {
        let mut watch = WatchRegistry::new();
        let node = index(3);
        watch.watch_scroll(node, (0.0, 0.0));

        assert!(!watch.accept_scroll(node, 0.0, 3.0));
        // 4px further than the suppressed sample, but only 1px further than
        // the last *emitted* baseline (still 0,0) -> still suppressed.
        assert!(!watch.accept_scroll(node, 0.0, 4.0));
        assert!(watch.accept_scroll(node, 0.0, 6.0));
    }

    #[test]
    fn unwatched_node_never_accepts_scroll() {
        let mut watch = WatchRegistry::new();
        assert!(!watch.accept_scroll(index(9), 100.0, 100.0));
    }
}
