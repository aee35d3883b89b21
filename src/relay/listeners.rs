//! # Listener registry: which topics have a ready consumer.
//!
//! A topic becomes ready through [`ListenerRegistry::mark_ready`] and stays
//! ready for the life of the consumer. The set only shrinks when a new
//! consumer attaches (see [`EventRelay::attach`](crate::EventRelay::attach)).
//!
//! Not synchronized on its own; it lives inside the relay state and is only
//! touched under the relay lock, together with the pending flush.

use std::collections::HashSet;

use crate::events::Topic;

#[derive(Debug, Default)]
pub(crate) struct ListenerRegistry {
    ready: HashSet<Topic>,
}

impl ListenerRegistry {
    /// Records `topic` as ready. Returns `true` if it was not ready before.
    pub(crate) fn mark_ready(&mut self, topic: &Topic) -> bool {
        self.ready.insert(topic.clone())
    }

    pub(crate) fn is_ready(&self, topic: &str) -> bool {
        self.ready.contains(topic)
    }

    /// Sorted snapshot of ready topics.
    pub(crate) fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self.ready.iter().cloned().collect();
        topics.sort_unstable();
        topics
    }

    pub(crate) fn len(&self) -> usize {
        self.ready.len()
    }

    /// Forgets every topic; a newly attached consumer must re-declare.
    pub(crate) fn clear(&mut self) {
        self.ready.clear();
    }
}
