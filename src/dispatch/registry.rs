//! Name → subscriber chain mapping shared by every bus kind

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::subscribers::{Subscriber, SubscriberSet};
use crate::name::Name;

const LOG_TARGET: &str = "catalog_dispatch::registry";

/// One registry per bus; clones share state
pub(crate) struct Registry<S> {
    sets: Arc<RwLock<HashMap<Name, SubscriberSet<S>>>>,
}

impl<S: Subscriber> Registry<S> {
    pub fn new() -> Self {
        Self {
            sets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn register(&self, name: Name, subscriber: S) {
        let mut sets = self.sets.write();
        let set = sets.entry(name.clone()).or_default();
        set.push(subscriber);
        tracing::trace!(target: LOG_TARGET, %name, subscribers = set.len(), "registered");
    }

    /// Removes one matching instance; empty sets are dropped from the map
    pub fn unregister(&self, name: &str, subscriber: &S) -> bool {
        let mut sets = self.sets.write();
        let Some(set) = sets.get_mut(name) else {
            return false;
        };

        let removed = set.remove(subscriber);
        if set.is_empty() {
            sets.remove(name);
        }
        tracing::trace!(target: LOG_TARGET, name, removed, "unregistered");
        removed
    }

    /// Snapshot of the chain for `name`, empty when nothing is registered.
    /// The lock is released before the caller invokes anything.
    pub fn chain(&self, name: &str) -> Vec<S> {
        self.sets
            .read()
            .get(name)
            .map(SubscriberSet::snapshot)
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self, name: &str) -> usize {
        self.sets.read().get(name).map_or(0, SubscriberSet::len)
    }

    pub fn names(&self) -> Vec<Name> {
        let mut names: Vec<Name> = self.sets.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn clear(&self) {
        self.sets.write().clear();
    }
}

impl<S> Clone for Registry<S> {
    fn clone(&self) -> Self {
        Self {
            sets: Arc::clone(&self.sets),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::subscribers::Listener;

    #[test]
    fn test_empty_set_is_dropped() {
        let registry = Registry::new();
        let listener = Listener::<()>::signal(|| {});

        registry.register(Name::from("EditFail"), listener.clone());
        assert_eq!(registry.names(), vec![Name::from("EditFail")]);

        assert!(registry.unregister("EditFail", &listener));
        assert!(registry.names().is_empty());
        assert!(!registry.unregister("EditFail", &listener));
    }

    #[test]
    fn test_clone_shares_state() {
        let registry = Registry::new();
        let other = registry.clone();

        registry.register(Name::from("a"), Listener::<()>::signal(|| {}));
        assert_eq!(other.subscriber_count("a"), 1);

        other.clear();
        assert_eq!(registry.subscriber_count("a"), 0);
    }
}
