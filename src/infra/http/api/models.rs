//! Translation between wire messages and domain values.

use bookshelf_api_types as api;

use crate::domain::books::{Book, BookFilter};

pub fn book_to_api(book: Book) -> api::Book {
    api::Book {
        book_id: book.id,
        title: book.title,
        author: book.author,
        publication_year: book.publication_year,
        genre: book.genre,
    }
}

pub fn books_to_api(books: Vec<Book>) -> api::ListBooksResponse {
    api::ListBooksResponse {
        books: books.into_iter().map(book_to_api).collect(),
    }
}

/// Empty strings and a zero year carry no constraint.
pub fn filter_from_parts(
    author: Option<String>,
    publication_year: Option<i32>,
    genre: Option<String>,
) -> BookFilter {
    BookFilter {
        author: author.filter(|value| !value.is_empty()),
        publication_year: publication_year.filter(|year| *year != 0),
        genre: genre.filter(|value| !value.is_empty()),
    }
}
