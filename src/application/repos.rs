//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::books::{Book, BookFilter, UserBook};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Read side of the entity store.
#[async_trait]
pub trait BooksRepo: Send + Sync {
    async fn find_book(&self, id: &str) -> Result<Option<Book>, RepoError>;

    /// Books matching `filter`, ordered by title ascending.
    async fn list_books(&self, filter: &BookFilter) -> Result<Vec<Book>, RepoError>;

    /// Books associated with `user_id` and matching `filter`, ordered by title ascending.
    async fn list_user_books(
        &self,
        user_id: &str,
        filter: &BookFilter,
    ) -> Result<Vec<Book>, RepoError>;
}

/// Write side of the entity store.
#[async_trait]
pub trait BooksWriteRepo: Send + Sync {
    /// Inserts `book`, generating an id when it has none. Returns the stored record.
    async fn create_book(&self, book: Book) -> Result<Book, RepoError>;

    /// Replaces title, author, year and genre. `RepoError::NotFound` for unknown ids.
    async fn update_book(&self, book: Book) -> Result<Book, RepoError>;

    /// Returns the deleted id. `RepoError::NotFound` for unknown ids.
    async fn delete_book(&self, id: &str) -> Result<String, RepoError>;

    /// Idempotent: an existing association is left untouched. Returns the book id.
    async fn add_book_to_user(&self, link: UserBook) -> Result<String, RepoError>;

    /// Returns the book id. `RepoError::NotFound` when the association is absent.
    async fn remove_book_from_user(&self, link: UserBook) -> Result<String, RepoError>;
}
