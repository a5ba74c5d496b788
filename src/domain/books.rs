//! Book catalog entities.

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// A catalog entry. `id` is assigned by the store when left empty and never
/// changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub publication_year: i32,
    #[serde(default)]
    pub genre: String,
}

impl Book {
    /// A book without an id yet; the store assigns one on insert.
    pub fn draft(
        title: impl Into<String>,
        author: impl Into<String>,
        publication_year: i32,
        genre: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            author: author.into(),
            publication_year,
            genre: genre.into(),
        }
    }

    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }

    /// Title and author are mandatory for every stored book.
    pub fn ensure_required_fields(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::missing("title"));
        }
        if self.author.trim().is_empty() {
            return Err(DomainError::missing("author"));
        }
        Ok(())
    }
}

/// Equality predicates for list queries. Every populated field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BookFilter {
    pub author: Option<String>,
    pub publication_year: Option<i32>,
    pub genre: Option<String>,
}

impl BookFilter {
    pub fn is_empty(&self) -> bool {
        self.author.is_none() && self.publication_year.is_none() && self.genre.is_none()
    }

    pub fn matches(&self, book: &Book) -> bool {
        self.author.as_deref().is_none_or(|a| a == book.author)
            && self.publication_year.is_none_or(|y| y == book.publication_year)
            && self.genre.as_deref().is_none_or(|g| g == book.genre)
    }
}

/// Membership of a book in a user's collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserBook {
    pub user_id: String,
    pub book_id: String,
}

impl UserBook {
    pub fn new(user_id: impl Into<String>, book_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            book_id: book_id.into(),
        }
    }
}

/// Sort order shared by every list operation: title, then id for ties.
pub fn sort_by_title(books: &mut [Book]) {
    books.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
}
