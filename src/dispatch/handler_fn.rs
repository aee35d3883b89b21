//! # Function-backed handler (`HandlerFn`)
//!
//! [`HandlerFn`] wraps a closure `F: Fn(Delivery) -> Fut`, producing a fresh
//! future per event. Shared state goes in an `Arc` captured by the closure.
//!
//! ## Example
//! ```rust
//! use eventrelay::{Delivery, Disposition, HandlerFn, HandlerRef};
//!
//! let h: HandlerRef = HandlerFn::arc("printer", |ev: Delivery| async move {
//!     println!("{} -> {:?}", ev.topic, ev.body);
//!     Disposition::Processed
//! });
//!
//! assert_eq!(h.name(), "printer");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::dispatch::handler::{Disposition, Handler};
use crate::events::Delivery;

/// Shared handle to a handler.
pub type HandlerRef = Arc<dyn Handler>;

/// Closure-backed handler implementation.
#[derive(Debug)]
pub struct HandlerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> HandlerFn<F> {
    /// Creates a new function-backed handler.
    ///
    /// Prefer [`HandlerFn::arc`] when you immediately need a [`HandlerRef`].
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the handler and returns it behind an `Arc`.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Delivery) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Disposition> + Send + 'static,
{
    async fn handle(&self, event: Delivery) -> Disposition {
        (self.f)(event).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
