//! # Consumer-side event handler trait.
//!
//! Provides [`Handler`], the extension point the consumer registers per topic
//! with [`Dispatcher::register_handler`](crate::Dispatcher::register_handler).
//!
//! ## Rules
//! - Events for one topic reach its handler one at a time, in delivery order.
//! - Handlers for different topics run concurrently.
//! - Returning [`Disposition::Processed`] makes the dispatcher acknowledge
//!   the event right away.
//! - Returning [`Disposition::Deferred`] hands acknowledgment to the handler,
//!   which must call [`EventRelay::acknowledge`](crate::EventRelay::acknowledge)
//!   with `event.correlation_id` later, exactly once. Until it does, the
//!   producer's resources stay held.
//! - A panic is caught and logged; the event is then acknowledged as if it
//!   had been processed (there are no retries).
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use eventrelay::{Delivery, Disposition, Handler};
//!
//! struct StepCounter;
//!
//! #[async_trait]
//! impl Handler for StepCounter {
//!     async fn handle(&self, event: Delivery) -> Disposition {
//!         let _steps = event.body.get("steps");
//!         Disposition::Processed
//!     }
//!
//!     fn name(&self) -> &str { "step-counter" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Delivery;

/// Who acknowledges an event after the handler returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Disposition {
    /// Done; the dispatcher acknowledges now.
    #[default]
    Processed,
    /// The handler will acknowledge later through the relay.
    Deferred,
}

/// Consumer-supplied handler for one topic.
///
/// ### Implementation requirements
/// - Use async I/O; do not block the consumer runtime.
/// - Handle errors internally; the relay does not interpret the outcome.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Processes one delivered event.
    async fn handle(&self, event: Delivery) -> Disposition;

    /// Name used in logs.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
