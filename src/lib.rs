//! # eventrelay
//!
//! **eventrelay** moves events from producer threads to a single consumer
//! runtime that may not be listening yet, and returns a per-event completion
//! to the producer once the consumer is done with it.
//!
//! Events emitted before the consumer has a handler for their topic are
//! buffered and flushed, in order, when the consumer declares the topic
//! ready. Every delivered event carries a correlation id; acknowledging that
//! id runs the producer's completion exactly once.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   producer thread        producer thread        producer thread
//!        │ emit()               │ emit()               │ emit()
//!        ▼                      ▼                      ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  EventRelay (one lock)                                            │
//! │  - ListenerRegistry  (topics with a ready consumer)               │
//! │  - PendingBuffer     (per-topic FIFO, global arrival seq)         │
//! │  - CorrelationIssuer (mints ids; lock-free)                       │
//! │  - CompletionTable   (id → producer completion)                   │
//! └──────┬──────────────────────────────────────────────▲─────────────┘
//!        │ Delivery { topic, body + correlationID }     │ acknowledge(id)
//!        ▼                                              │
//! ┌─────────────────────────┐                           │
//! │ Deliveries (unbounded)  │                           │
//! └──────┬──────────────────┘                           │
//!        ▼                                              │
//! ┌───────────────────────────────────────────────────┐ │
//! │  Dispatcher::run (consumer runtime)               │ │
//! │    topic → lane (queue + worker) → Handler ───────┼─┘
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! ### Lifecycle of one event
//! ```text
//! emit(topic, body, completion)
//!   ├─ topic not ready ─► buffered (seq), no id yet
//!   │                        │
//!   │      declare_ready(topic)
//!   │                        ▼
//!   └─ topic ready ───► id issued ─► body[correlationID] = id ─► pushed ─► completion registered
//!                                                                     │
//!                                        handler runs ◄───────────────┘
//!                                             │
//!                                   acknowledge(id) ─► completion runs (once)
//!                                   acknowledge(id) ─► RelayError::NotFound
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Relay**         | Buffer, deliver, correlate and acknowledge events.           | [`EventRelay`], [`Emitted`], [`ReadyReport`] |
//! | **Events**        | Event payloads, ids and producer completions.                | [`Delivery`], [`CorrelationId`], [`Completion`] |
//! | **Dispatch**      | Route deliveries to per-topic handlers on the consumer side. | [`Dispatcher`], [`Handler`], [`HandlerFn`]  |
//! | **Errors**        | Typed, non-fatal relay errors.                               | [`RelayError`]                              |
//! | **Configuration** | Id format, buffer bound, completion TTL.                     | [`RelayConfig`], [`IdScheme`]               |
//!
//! ## Example
//! ```rust
//! use eventrelay::{Body, Delivery, Dispatcher, Disposition, EventRelay, HandlerFn, RelayConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let (relay, deliveries) = EventRelay::new(RelayConfig::default());
//!
//!     // A producer emits before anyone listens: the event waits.
//!     let (done_tx, done_rx) = tokio::sync::oneshot::channel();
//!     relay
//!         .emit_fn("updates", Body::new(), move || {
//!             let _ = done_tx.send(());
//!         })
//!         .unwrap();
//!
//!     // The consumer mounts a handler: the buffered event is flushed to it.
//!     let dispatcher = Dispatcher::new(relay.clone());
//!     dispatcher.mount(
//!         "updates",
//!         HandlerFn::arc("updates", |ev: Delivery| async move {
//!             println!("got {}", ev.correlation_id);
//!             Disposition::Processed
//!         }),
//!     );
//!
//!     let token = CancellationToken::new();
//!     let consumer = tokio::spawn(dispatcher.run(deliveries, token.clone()));
//!
//!     // The producer's completion fires after the handler finished.
//!     done_rx.await.unwrap();
//!     token.cancel();
//!     consumer.await.unwrap();
//! }
//! ```
mod config;
mod dispatch;
mod error;
mod events;
mod relay;

// ---- Public re-exports ----

pub use config::RelayConfig;
pub use dispatch::{Dispatcher, Disposition, Handler, HandlerFn, HandlerRef};
pub use error::RelayError;
pub use events::{
    Body, CORRELATION_ID_KEY, Completion, CorrelationId, Deliveries, Delivery, Topic,
};
pub use relay::{CorrelationIssuer, Emitted, EventRelay, IdScheme, ReadyReport, RelayStats};
