//! Listener bookkeeping for `EventPipeline::bind`.
//!
//! There is no real DOM in this crate to attach a listener to, so `bind`
//! records `(target, event_type, token)` tuples; a browser embedding would
//! use the same entry point to drive real `addEventListener` calls and
//! `unbind_all` to drive `removeEventListener` at teardown.

/// Opaque identifier for one registered listener, scoped to the
/// [`BindRegistry`] that minted it.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct HandlerToken(u64);

/// One listener recorded by `bind`.
#[derive(Clone, Debug)]
pub struct BoundListener {
    pub target: String,
    pub event_type: String,
    pub token: HandlerToken,
}

/// All listeners registered so far in one session, so teardown can unbind
/// every one of them in a single pass.
#[derive(Default)]
pub struct BindRegistry {
    listeners: Vec<BoundListener>,
    next_token: u64,
}

impl BindRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a listener and returns a token identifying it.
    pub fn bind(&mut self, target: impl Into<String>, event_type: impl Into<String>) -> HandlerToken {
        let token = HandlerToken(self.next_token);
        self.next_token = self.next_token.wrapping_add(1);
        self.listeners.push(BoundListener { target: target.into(), event_type: event_type.into(), token });
        token
    }

    /// Removes and returns every registered listener, as teardown does.
    pub fn unbind_all(&mut self) -> Vec<BoundListener> {
        std::mem::take(&mut self.listeners)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbind_all_drains_every_listener_once() {
        let mut registry = BindRegistry::new();
        registry.bind("window", "scroll");
        registry.bind("node:3", "change");
        assert_eq!(registry.len(), 2);

        let unbound = registry.unbind_all();
        assert_eq!(unbound.len(), 2);
        assert!(registry.is_empty());
        assert_eq!(registry.unbind_all().len(), 0);
    }

    #[test]
    fn tokens_are_distinct() {
        let mut registry = BindRegistry::new();
        let first = registry.bind("a", "scroll");
        let second = registry.bind("b", "scroll");
        assert_ne!(first, second);
    }
}
