//! # Relay data model: topics, bodies, completions and deliveries.
//!
//! A producer hands the relay a [`Topic`], a [`Body`] and a [`Completion`].
//! Once the consumer is ready for that topic, the relay turns those into a
//! [`Delivery`]: the same body with a fresh [`CorrelationId`] injected under
//! [`CORRELATION_ID_KEY`].
//!
//! ## Ownership of a completion
//! ```text
//! producer ──emit──► PendingBuffer ──flush──► CompletionTable ──acknowledge──► invoke()
//!              └──────────(topic ready)──────────┘
//! ```
//! The completion is an `FnOnce`; [`Completion::invoke`] consumes it, so it
//! cannot run twice.
//!
//! ## Example
//! ```rust
//! use eventrelay::{Body, CorrelationId, Delivery, Topic, CORRELATION_ID_KEY};
//! use serde_json::json;
//!
//! let mut body = Body::new();
//! body.insert("x".into(), json!(1));
//!
//! let ev = Delivery::new(Topic::from("updates"), body, CorrelationId::from("1700000000:aB3x"));
//! assert_eq!(ev.body[CORRELATION_ID_KEY], json!("1700000000:aB3x"));
//! assert_eq!(ev.to_value()["topic"], json!("updates"));
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key under which the relay injects the correlation id into a delivered body.
pub const CORRELATION_ID_KEY: &str = "correlationID";

/// Event payload: a mapping of string keys to arbitrary JSON values.
///
/// The relay never inspects it, apart from injecting [`CORRELATION_ID_KEY`].
pub type Body = Map<String, Value>;

/// Named logical event channel (e.g. `"updates"`, `"tracking"`).
///
/// Cheap to clone (`Arc<str>`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(Arc<str>);

impl Topic {
    /// Creates a topic from any string-like value.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// Returns the topic name.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Topic {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for Topic {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<&Topic> for Topic {
    fn from(t: &Topic) -> Self {
        t.clone()
    }
}

impl Borrow<str> for Topic {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Per-delivery token linking a delivered event to its pending completion.
///
/// Valid from delivery until the first successful acknowledgment.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Returns the id as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl Borrow<str> for CorrelationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CorrelationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Producer-owned action that releases producer-side resources.
///
/// Must run exactly once, after the consumer acknowledged the event. Dropping
/// a `Completion` without invoking it is how the relay expresses "never
/// returned" (unknown topic, eviction).
///
/// The closure only has to be `Send`; the wrapper is also `Sync`, so errors
/// carrying a completion fit in `Box<dyn Error + Send + Sync>`.
pub struct Completion(Mutex<Box<dyn FnOnce() + Send + 'static>>);

impl Completion {
    /// Wraps a closure.
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self(Mutex::new(Box::new(f)))
    }

    /// A completion that does nothing.
    ///
    /// Handy for producers with no resources to release.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// Runs the action, consuming it.
    #[inline]
    pub fn invoke(self) {
        let f = self.0.into_inner().unwrap_or_else(PoisonError::into_inner);
        f()
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Completion(..)")
    }
}

/// Event as handed to the consumer.
///
/// `body` already carries `correlationID`; `correlation_id` duplicates it so
/// the consumer does not have to parse the body to acknowledge.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Delivery {
    /// Channel the event was emitted on.
    pub topic: Topic,
    /// Producer body, enriched with [`CORRELATION_ID_KEY`].
    pub body: Body,
    /// Id to pass back to [`EventRelay::acknowledge`](crate::EventRelay::acknowledge).
    #[serde(rename = "correlationID")]
    pub correlation_id: CorrelationId,
}

impl Delivery {
    /// Builds a delivery, injecting `id` into `body`.
    ///
    /// A `correlationID` key already present in the producer body is overwritten.
    pub fn new(topic: Topic, mut body: Body, id: CorrelationId) -> Self {
        body.insert(
            CORRELATION_ID_KEY.to_owned(),
            Value::String(id.as_str().to_owned()),
        );
        Self {
            topic,
            body,
            correlation_id: id,
        }
    }

    /// Strips the injected id and returns the producer's body.
    pub(crate) fn into_body(self) -> Body {
        let mut body = self.body;
        body.remove(CORRELATION_ID_KEY);
        body
    }

    /// Renders the wire shape `{topic, body, correlationID}`.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "topic": self.topic.as_str(),
            "body": Value::Object(self.body.clone()),
            CORRELATION_ID_KEY: self.correlation_id.as_str(),
        })
    }
}
