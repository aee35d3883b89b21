//! Relay events: data model and consumer channel.
//!
//! ## Contents
//! - [`Topic`], [`Body`], [`CorrelationId`], [`Completion`] what a producer emits
//! - [`Delivery`] what the consumer receives (body + injected `correlationID`)
//! - [`Deliveries`] receiving half of the unbounded delivery channel
//!
//! See `relay/mod.rs` for how events move through the relay.

mod event;
mod outlet;

pub use event::{Body, CORRELATION_ID_KEY, Completion, CorrelationId, Delivery, Topic};
pub use outlet::Deliveries;

pub(crate) use outlet::{Outlet, channel};
