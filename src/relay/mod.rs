//! Relay core: readiness, buffering, correlation and acknowledgment.
//!
//! The only public entry point is [`EventRelay`]; the components below live
//! inside its state and are only touched under its lock (except the issuer,
//! which needs none).
//!
//! Internal modules:
//! - `correlation`: mints correlation ids ([`IdScheme`]);
//! - `listeners`: set of topics with a ready consumer;
//! - `pending`: per-topic FIFO of events emitted before readiness;
//! - `completions`: outstanding completions keyed by correlation id;
//! - `state`: the locked state and the shared delivery path;
//! - `event_relay`: the façade.
//!
//! ## Event path
//! ```text
//! emit(topic, body, completion)
//!   ├─ topic ready ──► deliver: new_id → inject → Outlet.send → CompletionTable.register
//!   └─ not ready  ──► PendingBuffer.append (seq)
//!
//! declare_ready(topic)
//!   └─ ListenerRegistry.mark_ready → PendingBuffer.drain(topic) → deliver each, in seq order
//!
//! acknowledge(id)
//!   └─ CompletionTable.take(id) ──(lock released)──► completion.invoke()
//!                └─ None ──► RelayError::NotFound
//! ```

mod completions;
mod correlation;
mod event_relay;
mod listeners;
mod pending;
mod state;

pub use correlation::{CorrelationIssuer, IdScheme};
pub use event_relay::{Emitted, EventRelay, ReadyReport, RelayStats};
