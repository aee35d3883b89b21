//! # Completion table: outstanding deliveries awaiting acknowledgment.
//!
//! Maps each issued [`CorrelationId`] to the producer's [`Completion`].
//!
//! ## Rules
//! - At most one entry per id; the relay only registers ids `contains`
//!   reported as free.
//! - `take` removes the entry and hands it to the caller, who invokes it
//!   after releasing the relay lock. Whoever takes the entry is the only one
//!   who can run it; a second `take` for the same id returns `None`.
//! - Entries are never removed implicitly, except by `evict_older_than`
//!   when a TTL is configured.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::events::{Completion, CorrelationId, Topic};

/// A delivered event's pending completion.
#[derive(Debug)]
pub(crate) struct CompletionEntry {
    pub(crate) topic: Topic,
    pub(crate) completion: Completion,
    pub(crate) registered_at: Instant,
}

/// Entry removed by TTL eviction.
#[derive(Debug)]
pub(crate) struct Evicted {
    pub(crate) id: CorrelationId,
    pub(crate) entry: CompletionEntry,
}

#[derive(Debug, Default)]
pub(crate) struct CompletionTable {
    entries: HashMap<CorrelationId, CompletionEntry>,
}

impl CompletionTable {
    /// Stores a pending completion.
    ///
    /// `id` must not be outstanding. The relay draws ids with [`Self::contains`]
    /// under the same lock it registers with.
    pub(crate) fn register(&mut self, id: CorrelationId, topic: Topic, completion: Completion) {
        debug_assert!(!self.entries.contains_key(&id), "correlation id reused");
        self.entries.insert(
            id,
            CompletionEntry {
                topic,
                completion,
                registered_at: Instant::now(),
            },
        );
    }

    /// Removes and returns the entry for `id`.
    pub(crate) fn take(&mut self, id: &str) -> Option<CompletionEntry> {
        self.entries.remove(id)
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted snapshot of outstanding ids.
    pub(crate) fn outstanding(&self) -> Vec<CorrelationId> {
        let mut ids: Vec<CorrelationId> = self.entries.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Removes every entry registered more than `ttl` before `now`.
    pub(crate) fn evict_older_than(&mut self, now: Instant, ttl: Duration) -> Vec<Evicted> {
        let stale: Vec<CorrelationId> = self
            .entries
            .iter()
            .filter(|(_, e)| now.saturating_duration_since(e.registered_at) > ttl)
            .map(|(id, _)| id.clone())
            .collect();

        stale
            .into_iter()
            .filter_map(|id| self.entries.remove(&id).map(|entry| Evicted { id, entry }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting(hits: &Arc<AtomicUsize>) -> Completion {
        let h = Arc::clone(hits);
        Completion::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn second_take_observes_nothing() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut table = CompletionTable::default();
        table.register("id-1".into(), "updates".into(), counting(&hits));

        let entry = table.take("id-1").expect("entry");
        assert_eq!(entry.topic.as_str(), "updates");
        entry.completion.invoke();
        assert!(table.take("id-1").is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(table.is_empty());
    }

    #[test]
    fn outstanding_lists_registered_ids_sorted() {
        let mut table = CompletionTable::default();
        table.register("b".into(), "updates".into(), Completion::noop());
        table.register("a".into(), "tracking".into(), Completion::noop());
        assert!(table.contains("a"));
        assert!(!table.contains("c"));
        assert_eq!(table.len(), 2);

        let ids: Vec<String> = table.outstanding().iter().map(|i| i.to_string()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn evicts_only_stale_entries() {
        let mut table = CompletionTable::default();
        table.register("first".into(), "updates".into(), Completion::noop());
        table.register("second".into(), "updates".into(), Completion::noop());

        let evicted = table.evict_older_than(Instant::now(), Duration::from_secs(60));
        assert!(evicted.is_empty());

        let later = Instant::now() + Duration::from_secs(61);
        let evicted = table.evict_older_than(later, Duration::from_secs(60));
        assert_eq!(evicted.len(), 2);
        assert!(table.is_empty());
        assert!(table.outstanding().is_empty());
    }
}
