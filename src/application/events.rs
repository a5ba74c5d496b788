//! Domain events published after successful writes.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookEvent {
    BookCreated { book_id: String, title: String },
}

/// Wire payload for a `book-created` message.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BookCreatedPayload<'a> {
    book_id: &'a str,
    title: &'a str,
}

impl BookEvent {
    pub fn book_created(book_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::BookCreated {
            book_id: book_id.into(),
            title: title.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::BookCreated { .. } => "book_created",
        }
    }

    /// Partition key for the message: the book id.
    pub fn key(&self) -> &str {
        match self {
            Self::BookCreated { book_id, .. } => book_id,
        }
    }

    pub fn payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::BookCreated { book_id, title } => serde_json::to_value(BookCreatedPayload {
                book_id,
                title,
            }),
        }
    }
}

#[derive(Debug, Error)]
pub enum EventPublishError {
    #[error("event queue is full")]
    QueueFull,
    #[error("event notifier is closed")]
    Closed,
    #[error("event payload could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("event delivery failed: {0}")]
    Delivery(String),
}

impl EventPublishError {
    pub fn delivery(err: impl std::fmt::Display) -> Self {
        Self::Delivery(err.to_string())
    }
}

/// Fire-and-forget publisher. `publish` must return without waiting on delivery.
pub trait EventNotifier: Send + Sync {
    fn publish(&self, event: BookEvent) -> Result<(), EventPublishError>;
}

/// Notifier used when event publishing is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl EventNotifier for NoopNotifier {
    fn publish(&self, _event: BookEvent) -> Result<(), EventPublishError> {
        Ok(())
    }
}
