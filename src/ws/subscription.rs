//! Per-connection subscription manager.
//!
//! Tracks which allocation sources a WebSocket client is subscribed to
//! and provides server-side event filtering.

use std::collections::HashSet;

use crate::domain::SourceId;

/// Manages the source subscriptions for a single WebSocket connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed source ids. If `subscribe_all` is true, this set is ignored.
    source_ids: HashSet<SourceId>,
    /// Whether the client subscribes to all sources (wildcard `"*"`).
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds source ids to the subscription set. `wildcard` enables the
    /// catch-all subscription.
    pub fn subscribe(&mut self, ids: Vec<SourceId>, wildcard: bool) {
        if wildcard {
            self.subscribe_all = true;
        }
        for id in ids {
            self.source_ids.insert(id);
        }
    }

    /// Removes source ids from the subscription set. `wildcard` drops
    /// the catch-all subscription without touching explicit ids.
    pub fn unsubscribe(&mut self, ids: &[SourceId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = false;
        }
        for id in ids {
            self.source_ids.remove(id);
        }
    }

    /// Returns `true` if the given source id matches the subscription filter.
    #[must_use]
    pub fn matches(&self, source_id: &SourceId) -> bool {
        self.subscribe_all || self.source_ids.contains(source_id)
    }

    /// Returns the number of explicitly subscribed source ids.
    #[must_use]
    pub fn count(&self) -> usize {
        self.source_ids.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn empty_matches_nothing() {
        let mgr = SubscriptionManager::new();
        assert!(!mgr.matches(&SourceId::new("37623")));
    }

    #[test]
    fn subscribe_specific_source() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(vec![SourceId::new("37623")], false);
        assert!(mgr.matches(&SourceId::new("37623")));
        assert!(!mgr.matches(&SourceId::new("40891")));
    }

    #[test]
    fn wildcard_matches_everything() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(vec![], true);
        assert!(mgr.matches(&SourceId::new("37623")));
        assert!(mgr.matches(&SourceId::new("40891")));
    }

    #[test]
    fn unsubscribe_removes_source() {
        let mut mgr = SubscriptionManager::new();
        let id = SourceId::new("37623");
        mgr.subscribe(vec![id.clone()], false);
        assert!(mgr.matches(&id));
        mgr.unsubscribe(&[id.clone()], false);
        assert!(!mgr.matches(&id));
    }

    #[test]
    fn unsubscribe_wildcard_keeps_explicit_ids() {
        let mut mgr = SubscriptionManager::new();
        let id = SourceId::new("37623");
        mgr.subscribe(vec![id.clone()], true);
        assert!(mgr.matches(&SourceId::new("40891")));

        mgr.unsubscribe(&[], true);
        assert!(!mgr.matches(&SourceId::new("40891")));
        assert!(mgr.matches(&id));
    }

    #[test]
    fn count_tracks_explicit() {
        let mut mgr = SubscriptionManager::new();
        assert_eq!(mgr.count(), 0);
        mgr.subscribe(vec![SourceId::new("a"), SourceId::new("b")], false);
        assert_eq!(mgr.count(), 2);
    }
}
