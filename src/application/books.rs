//! Book orchestration: cache-aside reads over the entity store.
//!
//! The store is authoritative. The speed cache only ever holds a derived copy, so
//! every cache failure degrades to a miss (reads) or a logged warning (writes) and
//! never reaches the caller. Store failures are surfaced once, with their cause,
//! and never retried here.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::application::repos::{BooksRepo, BooksWriteRepo, RepoError};
use crate::cache::{SpeedCache, book_cache_key};
use crate::domain::books::{Book, BookFilter, UserBook};

#[derive(Debug, Error)]
pub enum BookServiceError {
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error("entity store failure")]
    Store(#[source] RepoError),
}

impl BookServiceError {
    fn book_not_found(id: &str) -> Self {
        Self::NotFound {
            entity: "book",
            id: id.to_string(),
        }
    }

    fn association_not_found(link: &UserBook) -> Self {
        Self::NotFound {
            entity: "user book",
            id: format!("{}/{}", link.user_id, link.book_id),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Stateless across calls; every dependency is shared and internally synchronized.
#[derive(Clone)]
pub struct BookService {
    reader: Arc<dyn BooksRepo>,
    writer: Arc<dyn BooksWriteRepo>,
    cache: Arc<dyn SpeedCache>,
    ttl: Duration,
}

impl BookService {
    pub fn new(
        reader: Arc<dyn BooksRepo>,
        writer: Arc<dyn BooksWriteRepo>,
        cache: Arc<dyn SpeedCache>,
        ttl: Duration,
    ) -> Self {
        Self {
            reader,
            writer,
            cache,
            ttl,
        }
    }

    /// Store the book as given, letting the store assign an id when none was supplied.
    pub async fn add_book(&self, book: Book) -> Result<Book, BookServiceError> {
        let stored = self.writer.create_book(book).await.map_err(|err| {
            error!(op = "add_book", error = %err, "failed to create book");
            BookServiceError::Store(err)
        })?;

        info!(op = "add_book", book_id = %stored.id, title = %stored.title, "book created");
        Ok(stored)
    }

    pub async fn get_book(&self, id: &str) -> Result<Book, BookServiceError> {
        let key = book_cache_key(id);

        match self.cache.get_book(&key).await {
            Ok(Some(book)) => {
                counter!("bookshelf_cache_hit_total").increment(1);
                debug!(op = "get_book", book_id = id, "cache hit");
                return Ok(book);
            }
            Ok(None) => {
                counter!("bookshelf_cache_miss_total").increment(1);
                debug!(op = "get_book", book_id = id, "cache miss");
            }
            Err(err) => {
                counter!("bookshelf_cache_error_total").increment(1);
                warn!(op = "get_book", book_id = id, error = %err, "cache read failed, falling back to store");
            }
        }

        let book = match self.reader.find_book(id).await {
            Ok(Some(book)) => book,
            Ok(None) | Err(RepoError::NotFound) => {
                debug!(op = "get_book", book_id = id, "book not found");
                return Err(BookServiceError::book_not_found(id));
            }
            Err(err) => {
                error!(op = "get_book", book_id = id, error = %err, "failed to load book");
                return Err(BookServiceError::Store(err));
            }
        };

        if let Err(err) = self.cache.set_book(&key, &book, self.ttl).await {
            counter!("bookshelf_cache_error_total").increment(1);
            warn!(op = "get_book", book_id = id, error = %err, "cache populate failed");
        }

        Ok(book)
    }

    /// Replace every mutable field, then drop the cached snapshot before returning.
    pub async fn update_book(&self, book: Book) -> Result<Book, BookServiceError> {
        let id = book.id.clone();

        let updated = match self.writer.update_book(book).await {
            Ok(updated) => updated,
            Err(RepoError::NotFound) => return Err(BookServiceError::book_not_found(&id)),
            Err(err) => {
                error!(op = "update_book", book_id = %id, error = %err, "failed to update book");
                return Err(BookServiceError::Store(err));
            }
        };

        self.invalidate("update_book", &id).await;
        info!(op = "update_book", book_id = %id, "book updated");
        Ok(updated)
    }

    /// Delete the book and its cached snapshot. Associations go with it.
    pub async fn delete_book(&self, id: &str) -> Result<String, BookServiceError> {
        let deleted = match self.writer.delete_book(id).await {
            Ok(deleted) => deleted,
            Err(RepoError::NotFound) => return Err(BookServiceError::book_not_found(id)),
            Err(err) => {
                error!(op = "delete_book", book_id = id, error = %err, "failed to delete book");
                return Err(BookServiceError::Store(err));
            }
        };

        self.invalidate("delete_book", id).await;
        info!(op = "delete_book", book_id = id, "book deleted");
        Ok(deleted)
    }

    /// Read straight from the store; list results are never cached.
    pub async fn list_books(&self, filter: &BookFilter) -> Result<Vec<Book>, BookServiceError> {
        let books = self.reader.list_books(filter).await.map_err(|err| {
            error!(op = "list_books", error = %err, "failed to list books");
            BookServiceError::Store(err)
        })?;

        info!(op = "list_books", count = books.len(), "books listed");
        Ok(books)
    }

    pub async fn get_user_books(
        &self,
        user_id: &str,
        filter: &BookFilter,
    ) -> Result<Vec<Book>, BookServiceError> {
        let books = self
            .reader
            .list_user_books(user_id, filter)
            .await
            .map_err(|err| {
                error!(op = "get_user_books", user_id, error = %err, "failed to list user books");
                BookServiceError::Store(err)
            })?;

        info!(op = "get_user_books", user_id, count = books.len(), "user books listed");
        Ok(books)
    }

    /// Succeeds when the association already exists.
    pub async fn add_book_to_user(
        &self,
        user_id: &str,
        book_id: &str,
    ) -> Result<String, BookServiceError> {
        let link = UserBook::new(user_id, book_id);
        match self.writer.add_book_to_user(link).await {
            Ok(book_id) => {
                info!(op = "add_book_to_user", user_id, book_id = %book_id, "book added to user");
                Ok(book_id)
            }
            Err(RepoError::NotFound) => Err(BookServiceError::book_not_found(book_id)),
            Err(err) => {
                error!(op = "add_book_to_user", user_id, book_id, error = %err, "failed to add book to user");
                Err(BookServiceError::Store(err))
            }
        }
    }

    pub async fn remove_book_from_user(
        &self,
        user_id: &str,
        book_id: &str,
    ) -> Result<String, BookServiceError> {
        let link = UserBook::new(user_id, book_id);
        match self.writer.remove_book_from_user(link.clone()).await {
            Ok(book_id) => {
                info!(op = "remove_book_from_user", user_id, book_id = %book_id, "book removed from user");
                Ok(book_id)
            }
            Err(RepoError::NotFound) => Err(BookServiceError::association_not_found(&link)),
            Err(err) => {
                error!(op = "remove_book_from_user", user_id, book_id, error = %err, "failed to remove book from user");
                Err(BookServiceError::Store(err))
            }
        }
    }

    async fn invalidate(&self, op: &'static str, id: &str) {
        if let Err(err) = self.cache.invalidate_book(&book_cache_key(id)).await {
            counter!("bookshelf_cache_error_total").increment(1);
            warn!(op, book_id = id, error = %err, "cache invalidation failed");
        }
    }
}
