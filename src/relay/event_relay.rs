//! # EventRelay: producer/consumer façade.
//!
//! Producers call [`EventRelay::emit`] from any thread. The consumer calls
//! [`EventRelay::declare_ready`] once per topic and
//! [`EventRelay::acknowledge`] once per delivered event.
//!
//! ## Rules
//! - `emit`, `declare_ready`, `acknowledge`, `discard`, `attach` and eviction
//!   serialize on one lock; none of them waits on the consumer.
//! - Completions run after the lock is released, so a completion may call
//!   back into the relay.
//! - A topic's buffered events are delivered in emission order, before any
//!   event emitted after `declare_ready` returns.
//!
//! ## Example
//! ```rust
//! use eventrelay::{Body, Emitted, EventRelay, RelayConfig};
//!
//! let (relay, mut deliveries) = EventRelay::new(RelayConfig::default());
//!
//! // Nobody listens yet: buffered, no id.
//! let first = relay.emit_fn("updates", Body::new(), || println!("released")).unwrap();
//! assert!(matches!(first, Emitted::Buffered { .. }));
//!
//! // Consumer mounts: the buffered event is delivered with an id.
//! let report = relay.declare_ready("updates");
//! assert_eq!(report.flushed, 1);
//!
//! let ev = deliveries.try_recv().unwrap();
//! relay.acknowledge(&ev.correlation_id).unwrap();          // prints "released"
//! assert!(relay.acknowledge(&ev.correlation_id).is_err()); // second ack: NotFound
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RelayConfig;
use crate::error::{RelayError, panic_message};
use crate::events::{Body, Completion, CorrelationId, Deliveries, Topic, channel};

use super::completions::Evicted;
use super::correlation::CorrelationIssuer;
use super::pending::PendingEvent;
use super::state::{RelayState, Undelivered};

/// What happened to an emitted event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Emitted {
    /// Handed to the consumer under this id.
    Delivered(CorrelationId),
    /// Waiting for the topic to become ready.
    Buffered {
        /// Position in the buffer-wide arrival order.
        seq: u64,
    },
}

/// Result of [`EventRelay::declare_ready`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadyReport {
    /// The topic that was declared.
    pub topic: Topic,
    /// `false` if the topic was already ready.
    pub newly_ready: bool,
    /// Buffered events delivered by this call.
    pub flushed: usize,
    /// Buffered events still waiting (consumer detached mid-flush).
    pub still_pending: usize,
}

/// Point-in-time counters, for diagnostics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    /// Topics with a ready consumer, sorted.
    pub ready_topics: Vec<Topic>,
    /// Buffered events across all topics.
    pub pending: usize,
    /// Delivered events awaiting acknowledgment.
    pub outstanding: usize,
    /// Deliveries since creation.
    pub delivered: u64,
    /// Successful acknowledgments since creation.
    pub acknowledged: u64,
    /// Whether a consumer is currently receiving.
    pub attached: bool,
}

/// Thread-safe relay between producer threads and one consumer runtime.
#[derive(Debug)]
pub struct EventRelay {
    cfg: RelayConfig,
    issuer: CorrelationIssuer,
    state: Mutex<RelayState>,
}

impl EventRelay {
    /// Creates a relay and the consumer's receiving half.
    pub fn new(cfg: RelayConfig) -> (Arc<Self>, Deliveries) {
        let (outlet, deliveries) = channel();
        let relay = Arc::new(Self {
            issuer: CorrelationIssuer::new(cfg.id_scheme),
            cfg,
            state: Mutex::new(RelayState::new(outlet)),
        });
        (relay, deliveries)
    }

    /// Returns the relay configuration.
    pub fn config(&self) -> &RelayConfig {
        &self.cfg
    }

    /// Emits an event on behalf of a producer.
    ///
    /// - Topic ready → an id is issued, injected into `body`, the event is
    ///   pushed to the consumer and `completion` is registered under the id.
    /// - Otherwise → the event is buffered untouched (no id yet).
    ///
    /// Never blocks on the consumer. Fails only with
    /// [`RelayError::BufferFull`], which hands `completion` back.
    pub fn emit(
        &self,
        topic: impl Into<Topic>,
        body: Body,
        completion: Completion,
    ) -> Result<Emitted, RelayError> {
        let topic = topic.into();
        let mut state = self.lock();

        if !state.listeners.is_ready(topic.as_str()) {
            return self.buffer(&mut state, topic, body, completion);
        }

        match state.deliver(&self.issuer, &topic, body, completion) {
            Ok(id) => {
                debug!(%topic, correlation_id = %id, "event delivered");
                Ok(Emitted::Delivered(id))
            }
            Err(Undelivered { body, completion }) => {
                self.buffer(&mut state, topic, body, completion)
            }
        }
    }

    /// [`emit`](Self::emit) with a plain closure as completion.
    pub fn emit_fn<F>(
        &self,
        topic: impl Into<Topic>,
        body: Body,
        f: F,
    ) -> Result<Emitted, RelayError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.emit(topic, body, Completion::new(f))
    }

    /// Marks `topic` ready and delivers its buffered events in arrival order.
    ///
    /// Each flushed event gets a fresh id and goes through the same delivery
    /// path as an immediate emit. Calling it again for a ready topic is
    /// harmless.
    pub fn declare_ready(&self, topic: impl Into<Topic>) -> ReadyReport {
        let topic = topic.into();
        let mut state = self.lock();

        let newly_ready = state.listeners.mark_ready(&topic);
        let mut flushed = 0;

        let mut queued = if state.pending.is_empty() {
            Vec::new().into_iter()
        } else {
            state.pending.drain(topic.as_str()).into_iter()
        };
        while let Some(ev) = queued.next() {
            let PendingEvent {
                seq,
                topic: ev_topic,
                body,
                completion,
                buffered_at,
            } = ev;

            match state.deliver(&self.issuer, &topic, body, completion) {
                Ok(id) => {
                    flushed += 1;
                    debug!(
                        %topic,
                        seq,
                        correlation_id = %id,
                        waited_ms = buffered_at.elapsed().as_millis() as u64,
                        "buffered event delivered"
                    );
                }
                Err(Undelivered { body, completion }) => {
                    let mut rest = vec![PendingEvent {
                        seq,
                        topic: ev_topic,
                        body,
                        completion,
                        buffered_at,
                    }];
                    rest.extend(queued);
                    state.pending.restore(&topic, rest);
                    break;
                }
            }
        }

        let still_pending = state.pending.len_for(topic.as_str());
        drop(state);

        if newly_ready {
            info!(%topic, flushed, still_pending, "listener ready");
        }
        ReadyReport {
            topic,
            newly_ready,
            flushed,
            still_pending,
        }
    }

    /// Runs the completion registered under `id`, exactly once.
    ///
    /// Returns [`RelayError::NotFound`] if `id` was never issued, was already
    /// acknowledged, or was evicted or discarded. That is a consumer bug and is
    /// logged, but it never affects other events.
    pub fn acknowledge(&self, id: impl AsRef<str>) -> Result<(), RelayError> {
        let id = id.as_ref();
        let entry = {
            let mut state = self.lock();
            let entry = state.completions.take(id);
            if entry.is_some() {
                state.acknowledged += 1;
            }
            entry
        };

        let Some(entry) = entry else {
            warn!(correlation_id = %id, "acknowledge for unknown or already acknowledged id");
            return Err(RelayError::NotFound { id: id.into() });
        };

        debug!(
            topic = %entry.topic,
            correlation_id = %id,
            held_ms = entry.registered_at.elapsed().as_millis() as u64,
            "event acknowledged"
        );
        run_completion(id, entry.completion);
        Ok(())
    }

    /// Forgets the entry for `id` WITHOUT running its completion.
    ///
    /// Used by the dispatcher for events it cannot route. Returns `false` if
    /// `id` was not outstanding.
    pub fn discard(&self, id: impl AsRef<str>) -> bool {
        let id = id.as_ref();
        let entry = self.lock().completions.take(id);
        match entry {
            Some(entry) => {
                warn!(
                    topic = %entry.topic,
                    correlation_id = %id,
                    "completion discarded without running"
                );
                true
            }
            None => false,
        }
    }

    /// True if the consumer declared `topic` ready.
    pub fn is_ready(&self, topic: &str) -> bool {
        self.lock().listeners.is_ready(topic)
    }

    /// Buffered events waiting for `topic`.
    pub fn pending_for(&self, topic: &str) -> usize {
        self.lock().pending.len_for(topic)
    }

    /// Sorted ids of delivered, unacknowledged events.
    pub fn outstanding(&self) -> Vec<CorrelationId> {
        self.lock().completions.outstanding()
    }

    /// Snapshot of relay counters.
    pub fn stats(&self) -> RelayStats {
        let state = self.lock();
        RelayStats {
            ready_topics: state.listeners.topics(),
            pending: state.pending.len(),
            outstanding: state.completions.len(),
            delivered: state.delivered,
            acknowledged: state.acknowledged,
            attached: state.is_attached(),
        }
    }

    /// Installs a new consumer after the previous [`Deliveries`] was dropped.
    ///
    /// The new consumer starts with no ready topics and must call
    /// [`declare_ready`](Self::declare_ready) again; buffered events wait
    /// until it does. Entries delivered to the old consumer stay outstanding
    /// (they can still be acknowledged, or evicted by the TTL sweeper).
    pub fn attach(&self) -> Result<Deliveries, RelayError> {
        let mut state = self.lock();
        if state.is_attached() {
            return Err(RelayError::ConsumerAttached);
        }

        let (outlet, deliveries) = channel();
        state.outlet = Some(outlet);
        let forgotten = state.listeners.len();
        state.listeners.clear();
        let pending = state.pending.len();
        drop(state);

        info!(forgotten_topics = forgotten, pending, "consumer attached");
        Ok(deliveries)
    }

    /// Evicts completion entries older than the configured TTL.
    ///
    /// Evicted completions are dropped without running and their ids become
    /// unknown. Returns the number evicted; always `0` when no TTL is set.
    pub fn evict_expired(&self) -> usize {
        let Some(ttl) = self.cfg.ttl() else {
            return 0;
        };

        let evicted = {
            let mut state = self.lock();
            if state.completions.is_empty() {
                return 0;
            }
            state.completions.evict_older_than(Instant::now(), ttl)
        };

        for Evicted { id, entry } in &evicted {
            warn!(
                topic = %entry.topic,
                correlation_id = %id,
                age_ms = entry.registered_at.elapsed().as_millis() as u64,
                "unacknowledged completion evicted"
            );
        }
        evicted.len()
    }

    /// Spawns a task that calls [`evict_expired`](Self::evict_expired) every
    /// `sweep_interval` until `token` is cancelled or the relay is dropped.
    ///
    /// Returns `None` when no TTL is configured. Must be called from within a
    /// tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>, token: CancellationToken) -> Option<JoinHandle<()>> {
        self.cfg.ttl()?;
        let period = self.cfg.sweep_interval_clamped();
        let relay: Weak<Self> = Arc::downgrade(self);

        Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tick.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tick.tick() => {
                        let Some(relay) = relay.upgrade() else { break };
                        relay.evict_expired();
                    }
                }
            }
        }))
    }

    fn buffer(
        &self,
        state: &mut RelayState,
        topic: Topic,
        body: Body,
        completion: Completion,
    ) -> Result<Emitted, RelayError> {
        if let Some(capacity) = self.cfg.pending_limit() {
            if state.pending.len() >= capacity {
                warn!(%topic, capacity, "pending buffer full; event rejected");
                return Err(RelayError::BufferFull {
                    topic,
                    capacity,
                    completion,
                });
            }
        }

        let seq = state.pending.append(topic.clone(), body, completion);
        debug!(%topic, seq, "event buffered");
        Ok(Emitted::Buffered { seq })
    }

    /// Every operation leaves the state consistent before it can panic, so a
    /// poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, RelayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Invokes a completion, containing a panic from producer code.
fn run_completion(id: &str, completion: Completion) {
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| completion.invoke()));
    if let Err(payload) = outcome {
        error!(
            correlation_id = %id,
            panic = %panic_message(payload.as_ref()),
            "completion panicked"
        );
    }
}
