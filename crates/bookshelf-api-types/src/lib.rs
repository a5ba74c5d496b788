//! Request and response messages for the Bookshelf RPC surface.
//!
//! Every RPC is a `POST` to `/bookshelf.BookService/<Method>` carrying one of the
//! request messages below as a JSON body.

use serde::{Deserialize, Serialize};

/// Fully-qualified service name used as the route prefix.
pub const SERVICE_NAME: &str = "bookshelf.BookService";

/// Method identifiers, exactly as they appear in request paths.
pub mod methods {
    pub const ADD_BOOK: &str = "/bookshelf.BookService/AddBook";
    pub const GET_BOOK: &str = "/bookshelf.BookService/GetBook";
    pub const UPDATE_BOOK: &str = "/bookshelf.BookService/UpdateBook";
    pub const DELETE_BOOK: &str = "/bookshelf.BookService/DeleteBook";
    pub const LIST_BOOKS: &str = "/bookshelf.BookService/ListBooks";
    pub const GET_USER_BOOKS: &str = "/bookshelf.BookService/GetUserBooks";
    pub const ADD_BOOK_TO_USER: &str = "/bookshelf.BookService/AddBookToUser";
    pub const REMOVE_BOOK_FROM_USER: &str = "/bookshelf.BookService/RemoveBookFromUser";

    pub const ALL: [&str; 8] = [
        ADD_BOOK,
        GET_BOOK,
        UPDATE_BOOK,
        DELETE_BOOK,
        LIST_BOOKS,
        GET_USER_BOOKS,
        ADD_BOOK_TO_USER,
        REMOVE_BOOK_FROM_USER,
    ];
}

/// Header carrying the caller's role claim.
pub const ROLE_HEADER: &str = "x-user-role";

/// Optional header a caller may use to shorten its deadline.
pub const TIMEOUT_HEADER: &str = "x-request-timeout-ms";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: String,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub publication_year: i32,
    #[serde(default)]
    pub genre: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddBookRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    pub publication_year: Option<i32>,
    pub genre: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetBookRequest {
    #[serde(default)]
    pub book_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBookRequest {
    #[serde(default)]
    pub book_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    pub publication_year: Option<i32>,
    pub genre: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteBookRequest {
    #[serde(default)]
    pub book_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListBooksRequest {
    pub author: Option<String>,
    pub publication_year: Option<i32>,
    pub genre: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetUserBooksRequest {
    #[serde(default)]
    pub user_id: String,
    pub author: Option<String>,
    pub publication_year: Option<i32>,
    pub genre: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserBookRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub book_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListBooksResponse {
    pub books: Vec<Book>,
}

/// Returned by `DeleteBook`, `AddBookToUser` and `RemoveBookFromUser`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookIdResponse {
    pub book_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}
