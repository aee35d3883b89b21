//! # Pending buffer: events waiting for their topic to become ready.
//!
//! ## Ordering
//! Every appended event gets a buffer-wide sequence number. Appends happen
//! under the relay lock, so the sequence is the total order in which
//! producers (on any thread) reached the relay. [`PendingBuffer::drain`]
//! returns a topic's events in that order.
//!
//! ```text
//! append(A, e1) seq=0 ─┐
//! append(B, e2) seq=1  │  queues: A → [e1, e3]
//! append(A, e3) seq=2 ─┘          B → [e2]
//!
//! drain(A) → [e1(seq 0), e3(seq 2)]
//! ```
//!
//! No ids are assigned here; a buffered event gets its correlation id at
//! delivery time.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use crate::events::{Body, Completion, Topic};

/// Event held until its topic has a ready consumer.
#[derive(Debug)]
pub(crate) struct PendingEvent {
    pub(crate) seq: u64,
    pub(crate) topic: Topic,
    pub(crate) body: Body,
    pub(crate) completion: Completion,
    pub(crate) buffered_at: Instant,
}

#[derive(Debug, Default)]
pub(crate) struct PendingBuffer {
    queues: HashMap<Topic, VecDeque<PendingEvent>>,
    next_seq: u64,
    len: usize,
}

impl PendingBuffer {
    /// Stores an event for later delivery and returns its sequence number.
    pub(crate) fn append(&mut self, topic: Topic, body: Body, completion: Completion) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;

        let ev = PendingEvent {
            seq,
            topic: topic.clone(),
            body,
            completion,
            buffered_at: Instant::now(),
        };
        self.queues.entry(topic).or_default().push_back(ev);
        self.len += 1;
        seq
    }

    /// Removes and returns all events for `topic`, oldest first.
    pub(crate) fn drain(&mut self, topic: &str) -> Vec<PendingEvent> {
        match self.queues.remove(topic) {
            Some(queue) => {
                self.len -= queue.len();
                queue.into()
            }
            None => Vec::new(),
        }
    }

    /// Puts events back at the front of their topic queue, keeping their order.
    ///
    /// Used when a flush could not complete because the consumer went away.
    pub(crate) fn restore(&mut self, topic: &Topic, events: Vec<PendingEvent>) {
        if events.is_empty() {
            return;
        }
        self.len += events.len();
        let queue = self.queues.entry(topic.clone()).or_default();
        for ev in events.into_iter().rev() {
            queue.push_front(ev);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn len_for(&self, topic: &str) -> usize {
        self.queues.get(topic).map_or(0, VecDeque::len)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn body(x: i64) -> Body {
        let mut b = Body::new();
        b.insert("x".into(), json!(x));
        b
    }

    #[test]
    fn drain_returns_topic_events_in_append_order() {
        let mut buf = PendingBuffer::default();
        let a = Topic::from("a");
        let b = Topic::from("b");
        buf.append(a.clone(), body(1), Completion::noop());
        buf.append(b.clone(), body(2), Completion::noop());
        buf.append(a.clone(), body(3), Completion::noop());
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.len_for("a"), 2);

        let drained = buf.drain("a");
        let xs: Vec<_> = drained.iter().map(|e| e.body["x"].clone()).collect();
        assert_eq!(xs, [json!(1), json!(3)]);
        assert_eq!(drained[0].seq, 0);
        assert_eq!(drained[1].seq, 2);
        assert!(drained.iter().all(|e| e.topic == a));

        assert_eq!(buf.len(), 1);
        assert_eq!(buf.len_for("a"), 0);
        assert!(buf.drain("a").is_empty());
    }

    #[test]
    fn restore_puts_events_back_in_front() {
        let mut buf = PendingBuffer::default();
        let t = Topic::from("updates");
        buf.append(t.clone(), body(1), Completion::noop());
        buf.append(t.clone(), body(2), Completion::noop());

        let drained = buf.drain("updates");
        buf.append(t.clone(), body(3), Completion::noop());
        buf.restore(&t, drained);

        let seqs: Vec<u64> = buf.drain("updates").iter().map(|e| e.seq).collect();
        assert_eq!(seqs, [0, 1, 2]);
        assert!(buf.is_empty());
    }
}
