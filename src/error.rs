//! Error type used by the relay and the consumer dispatcher.
//!
//! [`RelayError`] covers every relay-protocol failure. None of them is fatal:
//! operations return them as values and the process keeps running.
//! [`RelayError::as_label`] and [`RelayError::as_message`] give stable
//! strings for logs.

use std::any::Any;

use thiserror::Error;

use crate::events::{Completion, CorrelationId, Topic};

/// # Errors produced by the relay protocol.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RelayError {
    /// The correlation id is not outstanding: it was never issued, was already
    /// acknowledged, or was evicted/discarded.
    ///
    /// Usually a consumer-side bug (double acknowledgment).
    #[error("no pending completion for correlation id {id}")]
    NotFound {
        /// The id the consumer passed in.
        id: CorrelationId,
    },

    /// An event reached the dispatcher for a topic with no registered handler.
    ///
    /// The event is dropped and its completion is never returned.
    #[error("no handler registered for topic {topic}")]
    UnknownTopic {
        /// Topic of the dropped event.
        topic: Topic,
    },

    /// The pending buffer is at capacity.
    ///
    /// The completion is handed back untouched; the producer decides whether
    /// to run it.
    #[error("pending buffer full ({capacity} events); event for topic {topic} rejected")]
    BufferFull {
        /// Topic of the rejected event.
        topic: Topic,
        /// Configured capacity.
        capacity: usize,
        /// The producer's completion, returned to its owner.
        completion: Completion,
    },

    /// [`EventRelay::attach`](crate::EventRelay::attach) was called while the
    /// current consumer is still receiving.
    #[error("a consumer is already attached")]
    ConsumerAttached,
}

impl RelayError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use eventrelay::RelayError;
    ///
    /// let err = RelayError::NotFound { id: "1700000000:aB3x".into() };
    /// assert_eq!(err.as_label(), "relay_not_found");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RelayError::NotFound { .. } => "relay_not_found",
            RelayError::UnknownTopic { .. } => "relay_unknown_topic",
            RelayError::BufferFull { .. } => "relay_buffer_full",
            RelayError::ConsumerAttached => "relay_consumer_attached",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RelayError::NotFound { id } => format!("unknown or already acknowledged id={id}"),
            RelayError::UnknownTopic { topic } => format!("no handler for topic={topic}"),
            RelayError::BufferFull { topic, capacity, .. } => {
                format!("buffer full: capacity={capacity} topic={topic}")
            }
            RelayError::ConsumerAttached => "consumer already attached".to_string(),
        }
    }

    /// True for [`RelayError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, RelayError::NotFound { .. })
    }

    /// Takes the producer's completion back out of a [`RelayError::BufferFull`].
    ///
    /// Returns `None` for every other variant.
    pub fn into_completion(self) -> Option<Completion> {
        match self {
            RelayError::BufferFull { completion, .. } => Some(completion),
            _ => None,
        }
    }
}

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
