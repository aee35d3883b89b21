//! # Consumer-facing delivery channel.
//!
//! [`Outlet`] is the relay's sending half, [`Deliveries`] the consumer's
//! receiving half. Both wrap [`tokio::sync::mpsc`]'s unbounded channel.
//!
//! ## Architecture
//! ```text
//! Producers (many threads):              Consumer (one runtime):
//!   emit ──┐
//!   emit ──┼──► EventRelay ──► Outlet ───────► Deliveries ──► Dispatcher
//!   emit ──┘   (relay lock)   (unbounded)
//! ```
//!
//! ## Rules
//! - **Never blocks**: `send` is synchronous and callable from any thread,
//!   inside or outside a tokio runtime.
//! - **Unbounded**: a delivered event already owns a completion entry, so
//!   dropping it on overflow would leak the entry; backpressure lives in the
//!   pending buffer instead.
//! - **Order**: sends happen under the relay lock, so the consumer observes
//!   deliveries in relay order.
//! - **Closed**: once the consumer drops [`Deliveries`], `send` hands the
//!   delivery back so the relay can buffer it again.

use tokio::sync::mpsc;

use super::event::Delivery;

/// Creates a connected outlet / receiver pair.
pub(crate) fn channel() -> (Outlet, Deliveries) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Outlet { tx }, Deliveries { rx })
}

/// Sending half owned by the relay.
#[derive(Clone, Debug)]
pub(crate) struct Outlet {
    tx: mpsc::UnboundedSender<Delivery>,
}

impl Outlet {
    /// Pushes a delivery to the consumer.
    ///
    /// Returns the delivery back if the consumer has gone away.
    pub(crate) fn send(&self, delivery: Delivery) -> Result<(), Delivery> {
        self.tx.send(delivery).map_err(|mpsc::error::SendError(d)| d)
    }

    /// True if the consumer dropped its receiver.
    pub(crate) fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half held by the consumer runtime.
///
/// Usually passed straight to [`Dispatcher::run`](crate::Dispatcher::run).
/// Dropping it detaches the consumer; see [`EventRelay::attach`](crate::EventRelay::attach).
#[derive(Debug)]
pub struct Deliveries {
    rx: mpsc::UnboundedReceiver<Delivery>,
}

impl Deliveries {
    /// Waits for the next delivery.
    ///
    /// Returns `None` once the relay has been dropped and the queue is empty.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    /// Takes the next delivery if one is queued, without waiting.
    pub fn try_recv(&mut self) -> Option<Delivery> {
        self.rx.try_recv().ok()
    }

    /// Stops accepting new deliveries; already queued ones can still be
    /// received. The relay treats the consumer as detached from then on.
    pub fn close(&mut self) {
        self.rx.close();
    }

    /// Number of deliveries queued and not yet received.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// True if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
