//! # Consumer dispatcher.
//!
//! The consumer half of the relay: a topic → [`Handler`] table and the loop
//! that feeds delivered events to it and acknowledges them.
//!
//! ## Contents
//! - [`Handler`] trait implemented by consumer code, plus [`Disposition`]
//! - [`HandlerFn`] closure-backed handler, [`HandlerRef`] shared handle
//! - [`Dispatcher`] routing, per-topic lanes, acknowledgment

mod dispatcher;
mod handler;
mod handler_fn;

pub use dispatcher::Dispatcher;
pub use handler::{Disposition, Handler};
pub use handler_fn::{HandlerFn, HandlerRef};
