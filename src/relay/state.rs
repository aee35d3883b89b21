//! Relay state guarded by the relay's single lock.
//!
//! Holds the listener registry, pending buffer, completion table and the
//! consumer outlet, plus the one delivery path both `emit` and
//! `declare_ready` go through.

use tracing::{debug, warn};

use crate::events::{Body, Completion, CorrelationId, Delivery, Outlet, Topic};

use super::completions::CompletionTable;
use super::correlation::CorrelationIssuer;
use super::listeners::ListenerRegistry;
use super::pending::PendingBuffer;

/// Event the consumer could not take; goes back to the pending buffer.
pub(crate) struct Undelivered {
    pub(crate) body: Body,
    pub(crate) completion: Completion,
}

#[derive(Debug)]
pub(crate) struct RelayState {
    pub(crate) listeners: ListenerRegistry,
    pub(crate) pending: PendingBuffer,
    pub(crate) completions: CompletionTable,
    /// `None` once the consumer's receiver was found closed.
    pub(crate) outlet: Option<Outlet>,
    pub(crate) delivered: u64,
    pub(crate) acknowledged: u64,
}

impl RelayState {
    pub(crate) fn new(outlet: Outlet) -> Self {
        Self {
            listeners: ListenerRegistry::default(),
            pending: PendingBuffer::default(),
            completions: CompletionTable::default(),
            outlet: Some(outlet),
            delivered: 0,
            acknowledged: 0,
        }
    }

    /// True if an outlet is installed and its receiver is alive.
    pub(crate) fn is_attached(&self) -> bool {
        self.outlet.as_ref().is_some_and(|o| !o.is_closed())
    }

    /// Issues an id, hands the enriched event to the consumer and registers
    /// its completion.
    ///
    /// Must be called with the relay lock held: the id is checked free,
    /// sent and registered without any other operation in between, so the
    /// consumer cannot acknowledge an id before it is registered.
    pub(crate) fn deliver(
        &mut self,
        issuer: &CorrelationIssuer,
        topic: &Topic,
        body: Body,
        completion: Completion,
    ) -> Result<CorrelationId, Undelivered> {
        let Some(outlet) = self.outlet.as_ref() else {
            return Err(Undelivered { body, completion });
        };

        let id = loop {
            let id = issuer.new_id();
            if !self.completions.contains(id.as_str()) {
                break id;
            }
            debug!(correlation_id = %id, "correlation id collision; drawing again");
        };

        if let Err(delivery) = outlet.send(Delivery::new(topic.clone(), body, id.clone())) {
            warn!(%topic, "consumer detached; keeping event pending");
            self.outlet = None;
            return Err(Undelivered {
                body: delivery.into_body(),
                completion,
            });
        }

        self.completions.register(id.clone(), topic.clone(), completion);
        self.delivered += 1;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::events::{CORRELATION_ID_KEY, channel};

    #[test]
    fn deliver_registers_completion_and_injects_id() {
        let (outlet, mut rx) = channel();
        let mut state = RelayState::new(outlet);
        let mut body = Body::new();
        body.insert("x".into(), json!(1));

        let id = state
            .deliver(&CorrelationIssuer::default(), &"updates".into(), body, Completion::noop())
            .ok()
            .expect("delivered");

        let got = rx.try_recv().expect("delivery");
        assert_eq!(got.correlation_id, id);
        assert_eq!(got.body[CORRELATION_ID_KEY], json!(id.as_str()));
        assert!(state.completions.contains(id.as_str()));
        assert_eq!(state.delivered, 1);
    }

    #[test]
    fn deliver_to_closed_consumer_returns_event_untouched() {
        let (outlet, rx) = channel();
        drop(rx);
        let mut state = RelayState::new(outlet);
        let mut body = Body::new();
        body.insert("x".into(), json!(1));

        let back = match state.deliver(
            &CorrelationIssuer::default(),
            &"updates".into(),
            body.clone(),
            Completion::noop(),
        ) {
            Ok(_) => panic!("consumer is gone"),
            Err(back) => back,
        };
        assert_eq!(back.body, body);
        assert!(state.outlet.is_none());
        assert!(!state.is_attached());
        assert_eq!(state.completions.len(), 0);
    }
}
