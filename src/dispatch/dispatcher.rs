//! # Dispatcher: consumer-side routing of delivered events.
//!
//! [`Dispatcher`] owns the topic → [`Handler`] table and drives the
//! consumer loop over [`Deliveries`].
//!
//! ## Architecture
//! ```text
//! Deliveries ──► run() ──route by topic──► [lane "updates"]  ─► worker ─► dispatch() ─► handler
//!                  │                       [lane "tracking"] ─► worker ─► dispatch() ─► handler
//!                  │                                                         │
//!                  └─ no handler ─► warn + relay.discard(id)                 └─► relay.acknowledge(id)
//! ```
//!
//! ## What it guarantees
//! - Per-topic FIFO: one lane (unbounded queue + worker task) per topic.
//! - Lanes for different topics interleave freely.
//! - Handler panics are caught and logged; the lane keeps running.
//! - On shutdown, every delivery already queued for this consumer is still
//!   handled; later emits stay buffered in the relay.
//!
//! ## What it does **not** guarantee
//! - No retries: an event is handled once, whatever the outcome.
//! - An event for a topic without a handler is dropped and its completion is
//!   never returned to the producer.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dispatch::handler::Disposition;
use crate::dispatch::handler_fn::HandlerRef;
use crate::error::{RelayError, panic_message};
use crate::events::{Deliveries, Delivery, Topic};
use crate::relay::{EventRelay, ReadyReport};

/// Per-topic queue and the worker draining it.
struct Lane {
    sender: mpsc::UnboundedSender<Delivery>,
    worker: JoinHandle<()>,
}

impl Lane {
    fn spawn(dispatcher: Arc<Dispatcher>, topic: Topic) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Delivery>();
        let worker = tokio::spawn(async move {
            while let Some(delivery) = rx.recv().await {
                if let Err(e) = dispatcher.dispatch(delivery).await {
                    debug!(%topic, label = e.as_label(), "lane event not processed");
                }
            }
        });
        Self { sender: tx, worker }
    }
}

/// Routes delivered events to per-topic handlers and acknowledges them.
pub struct Dispatcher {
    relay: Arc<EventRelay>,
    handlers: RwLock<HashMap<Topic, HandlerRef>>,
}

impl Dispatcher {
    /// Creates a dispatcher acknowledging through `relay`.
    #[must_use]
    pub fn new(relay: Arc<EventRelay>) -> Arc<Self> {
        Arc::new(Self {
            relay,
            handlers: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the relay this dispatcher acknowledges through.
    pub fn relay(&self) -> &Arc<EventRelay> {
        &self.relay
    }

    /// Registers `handler` for `topic`, replacing any previous one.
    ///
    /// Does not declare the topic ready; see [`mount`](Self::mount).
    pub fn register_handler(&self, topic: impl Into<Topic>, handler: HandlerRef) {
        let topic = topic.into();
        let name = handler.name().to_owned();
        let replaced = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(topic.clone(), handler)
            .is_some();
        info!(%topic, handler = %name, replaced, "handler registered");
    }

    /// Registers `handler` and then declares `topic` ready on the relay, so
    /// buffered events flush straight to it.
    pub fn mount(&self, topic: impl Into<Topic>, handler: HandlerRef) -> ReadyReport {
        let topic = topic.into();
        self.register_handler(topic.clone(), handler);
        self.relay.declare_ready(topic)
    }

    /// Removes the handler for `topic`. Returns `false` if there was none.
    ///
    /// The topic stays ready on the relay; later events for it are dropped as
    /// unknown.
    pub fn unregister_handler(&self, topic: &str) -> bool {
        let removed = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(topic)
            .is_some();
        if removed {
            info!(%topic, "handler unregistered");
        }
        removed
    }

    /// True if a handler is registered for `topic`.
    pub fn has_handler(&self, topic: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(topic)
    }

    /// Sorted list of topics with a handler.
    pub fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        topics.sort_unstable();
        topics
    }

    /// Consumer loop: routes deliveries to per-topic lanes until `token` is
    /// cancelled or the relay side of the channel is gone.
    ///
    /// On exit the channel is closed, deliveries still queued in it are
    /// routed, then lanes are closed and their workers awaited. Nothing
    /// delivered to this consumer is left unhandled; events emitted after the
    /// channel closes are buffered by the relay until the next
    /// [`EventRelay::attach`].
    pub async fn run(self: Arc<Self>, mut deliveries: Deliveries, token: CancellationToken) {
        let mut lanes: HashMap<Topic, Lane> = HashMap::new();

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                next = deliveries.recv() => match next {
                    Some(delivery) => self.route(&mut lanes, delivery),
                    None => break,
                }
            }
        }

        // Later emits go back to the pending buffer; anything already queued
        // is still handled.
        deliveries.close();
        let mut drained = 0usize;
        while let Some(delivery) = deliveries.try_recv() {
            self.route(&mut lanes, delivery);
            drained += 1;
        }
        if drained > 0 {
            debug!(drained, "queued deliveries routed on shutdown");
        }

        for (_, lane) in lanes {
            drop(lane.sender);
            if let Err(e) = lane.worker.await {
                error!(error = %e, "dispatcher lane worker failed");
            }
        }
        debug!("dispatcher stopped");
    }

    /// Processes one delivery on the current task.
    ///
    /// - No handler → warns, discards the completion entry without running
    ///   it, returns [`RelayError::UnknownTopic`].
    /// - Otherwise → runs the handler (panics caught) and acknowledges unless
    ///   it returned [`Disposition::Deferred`].
    pub async fn dispatch(&self, delivery: Delivery) -> Result<Disposition, RelayError> {
        let Some(handler) = self.handler(delivery.topic.as_str()) else {
            return Err(self.drop_unrouted(delivery));
        };

        let topic = delivery.topic.clone();
        let id = delivery.correlation_id.clone();

        let disposition = match std::panic::AssertUnwindSafe(handler.handle(delivery))
            .catch_unwind()
            .await
        {
            Ok(d) => d,
            Err(payload) => {
                error!(
                    %topic,
                    correlation_id = %id,
                    handler = handler.name(),
                    panic = %panic_message(payload.as_ref()),
                    "handler panicked"
                );
                Disposition::Processed
            }
        };

        if disposition == Disposition::Processed {
            self.relay.acknowledge(&id)?;
        } else {
            debug!(%topic, correlation_id = %id, "acknowledgment deferred by handler");
        }
        Ok(disposition)
    }

    fn route(self: &Arc<Self>, lanes: &mut HashMap<Topic, Lane>, delivery: Delivery) {
        if !self.has_handler(delivery.topic.as_str()) {
            self.drop_unrouted(delivery);
            return;
        }

        let topic = delivery.topic.clone();
        let lane = lanes
            .entry(topic.clone())
            .or_insert_with(|| Lane::spawn(Arc::clone(self), topic.clone()));

        if let Err(mpsc::error::SendError(delivery)) = lane.sender.send(delivery) {
            // Worker is gone; start a fresh one for this topic.
            warn!(%topic, "dispatcher lane closed; respawning");
            *lane = Lane::spawn(Arc::clone(self), topic);
            if let Err(mpsc::error::SendError(delivery)) = lane.sender.send(delivery) {
                self.drop_unrouted(delivery);
            }
        }
    }

    fn handler(&self, topic: &str) -> Option<HandlerRef> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .cloned()
    }

    fn drop_unrouted(&self, delivery: Delivery) -> RelayError {
        warn!(
            topic = %delivery.topic,
            correlation_id = %delivery.correlation_id,
            "no handler for topic; event dropped"
        );
        self.relay.discard(&delivery.correlation_id);
        RelayError::UnknownTopic {
            topic: delivery.topic,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::config::RelayConfig;
    use crate::dispatch::HandlerFn;
    use crate::events::{Body, Completion};

    fn body(x: i64) -> Body {
        let mut b = Body::new();
        b.insert("x".into(), json!(x));
        b
    }

    struct Boom;

    #[async_trait::async_trait]
    impl crate::dispatch::Handler for Boom {
        async fn handle(&self, _event: Delivery) -> Disposition {
            panic!("handler bug");
        }
    }

    fn recorder(seen: &Arc<Mutex<Vec<i64>>>) -> HandlerRef {
        let seen = Arc::clone(seen);
        HandlerFn::arc("recorder", move |ev: Delivery| {
            let seen = Arc::clone(&seen);
            async move {
                if let Some(x) = ev.body["x"].as_i64() {
                    seen.lock().unwrap().push(x);
                }
                Disposition::Processed
            }
        })
    }

    #[tokio::test]
    async fn dispatch_runs_handler_then_acknowledges() {
        let (relay, mut rx) = EventRelay::new(RelayConfig::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new(Arc::clone(&relay));
        dispatcher.mount("updates", recorder(&seen));

        let h = Arc::clone(&hits);
        relay
            .emit_fn("updates", body(7), move || {
                h.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let ev = rx.try_recv().unwrap();
        let d = dispatcher.dispatch(ev).await.unwrap();
        assert_eq!(d, Disposition::Processed);
        assert_eq!(*seen.lock().unwrap(), [7]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(relay.outstanding().is_empty());
    }

    #[tokio::test]
    async fn unknown_topic_is_dropped_without_completion() {
        let (relay, mut rx) = EventRelay::new(RelayConfig::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(Arc::clone(&relay));
        relay.declare_ready("ghost");

        let h = Arc::clone(&hits);
        relay
            .emit_fn("ghost", body(1), move || {
                h.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let err = dispatcher.dispatch(rx.try_recv().unwrap()).await.unwrap_err();
        assert_eq!(err.as_label(), "relay_unknown_topic");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(relay.outstanding().is_empty());
    }

    #[tokio::test]
    async fn deferred_handler_acknowledges_later() {
        let (relay, mut rx) = EventRelay::new(RelayConfig::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(Arc::clone(&relay));
        let parked = Arc::new(Mutex::new(None));

        let p = Arc::clone(&parked);
        dispatcher.mount(
            "tracking",
            HandlerFn::arc("deferred", move |ev: Delivery| {
                let p = Arc::clone(&p);
                async move {
                    *p.lock().unwrap() = Some(ev.correlation_id);
                    Disposition::Deferred
                }
            }),
        );

        let h = Arc::clone(&hits);
        relay
            .emit_fn("tracking", Body::new(), move || {
                h.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let d = dispatcher.dispatch(rx.try_recv().unwrap()).await.unwrap();
        assert_eq!(d, Disposition::Deferred);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(relay.outstanding().len(), 1);

        let id = parked.lock().unwrap().take().unwrap();
        relay.acknowledge(&id).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_handler_still_acknowledges() {
        let (relay, mut rx) = EventRelay::new(RelayConfig::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(Arc::clone(&relay));
        dispatcher.mount("updates", Arc::new(Boom));

        let h = Arc::clone(&hits);
        relay
            .emit_fn("updates", Body::new(), move || {
                h.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let d = dispatcher.dispatch(rx.try_recv().unwrap()).await.unwrap();
        assert_eq!(d, Disposition::Processed);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn run_keeps_per_topic_order_and_drains_on_cancel() {
        let (relay, rx) = EventRelay::new(RelayConfig::default());
        let dispatcher = Dispatcher::new(Arc::clone(&relay));
        let seen = Arc::new(Mutex::new(Vec::new()));

        for x in 0..5 {
            relay.emit("updates", body(x), Completion::noop()).unwrap();
        }
        dispatcher.mount("updates", recorder(&seen));
        for x in 5..10 {
            relay.emit("updates", body(x), Completion::noop()).unwrap();
        }

        let token = CancellationToken::new();
        let consumer = tokio::spawn(Arc::clone(&dispatcher).run(rx, token.clone()));

        while relay.stats().acknowledged < 10 {
            tokio::task::yield_now().await;
        }
        token.cancel();
        consumer.await.unwrap();

        assert_eq!(*seen.lock().unwrap(), (0..10).collect::<Vec<_>>());
        assert!(relay.outstanding().is_empty());
    }

    #[tokio::test]
    async fn cancelled_run_still_handles_queued_deliveries() {
        let (relay, rx) = EventRelay::new(RelayConfig::default());
        let dispatcher = Dispatcher::new(Arc::clone(&relay));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let hits = Arc::new(AtomicUsize::new(0));
        dispatcher.mount("updates", recorder(&seen));

        for x in 0..3 {
            let h = Arc::clone(&hits);
            relay
                .emit_fn("updates", body(x), move || {
                    h.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        let token = CancellationToken::new();
        token.cancel();
        Arc::clone(&dispatcher).run(rx, token).await;

        assert_eq!(*seen.lock().unwrap(), [0, 1, 2]);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(relay.outstanding().is_empty());

        // The consumer is gone; new events wait for the next one.
        assert!(!relay.stats().attached);
        let emitted = relay.emit("updates", body(3), Completion::noop()).unwrap();
        assert!(matches!(emitted, crate::Emitted::Buffered { .. }));

        let mut rx = relay.attach().unwrap();
        assert_eq!(dispatcher.mount("updates", recorder(&seen)).flushed, 1);
        assert_eq!(rx.try_recv().unwrap().body["x"], json!(3));
    }

    #[test]
    fn register_replaces_and_unregister_removes() {
        let (relay, _rx) = EventRelay::new(RelayConfig::default());
        let dispatcher = Dispatcher::new(relay);
        let seen = Arc::new(Mutex::new(Vec::new()));

        dispatcher.register_handler("updates", recorder(&seen));
        dispatcher.register_handler("updates", recorder(&seen));
        dispatcher.register_handler("tracking", recorder(&seen));
        assert_eq!(
            dispatcher.topics(),
            vec![Topic::from("tracking"), Topic::from("updates")]
        );

        assert!(dispatcher.unregister_handler("updates"));
        assert!(!dispatcher.unregister_handler("updates"));
        assert!(!dispatcher.has_handler("updates"));
        assert!(dispatcher.has_handler("tracking"));
    }
}
