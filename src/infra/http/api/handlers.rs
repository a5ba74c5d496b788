//! RPC handlers: field validation, shape translation, then one orchestrator call.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use bookshelf_api_types as api;
use tracing::warn;

use crate::application::events::BookEvent;
use crate::domain::books::Book;

use super::error::{ApiError, book_error_to_api};
use super::models::{book_to_api, books_to_api, filter_from_parts};
use super::state::ApiState;

type ApiResult<T> = Result<Json<T>, ApiError>;

fn parse<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::invalid_input("Malformed request body", Some(rejection.body_text())))
}

fn required(field: &'static str, value: String) -> Result<String, ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::invalid_input(
            "Missing required field",
            Some(format!("`{field}` must not be empty")),
        ));
    }
    Ok(value)
}

pub async fn add_book(
    State(state): State<ApiState>,
    payload: Result<Json<api::AddBookRequest>, JsonRejection>,
) -> ApiResult<api::Book> {
    let request = parse(payload)?;
    let book = Book::draft(
        request.title,
        request.author,
        request.publication_year.unwrap_or_default(),
        request.genre.unwrap_or_default(),
    );
    book.ensure_required_fields()?;

    let stored = state.books.add_book(book).await.map_err(book_error_to_api)?;

    let event = BookEvent::book_created(stored.id.clone(), stored.title.clone());
    if let Err(err) = state.events.publish(event) {
        warn!(op = "add_book", book_id = %stored.id, error = %err, "book created event not published");
    }

    Ok(Json(book_to_api(stored)))
}

pub async fn get_book(
    State(state): State<ApiState>,
    payload: Result<Json<api::GetBookRequest>, JsonRejection>,
) -> ApiResult<api::Book> {
    let request = parse(payload)?;
    let id = required("book_id", request.book_id)?;

    let book = state.books.get_book(&id).await.map_err(book_error_to_api)?;
    Ok(Json(book_to_api(book)))
}

pub async fn update_book(
    State(state): State<ApiState>,
    payload: Result<Json<api::UpdateBookRequest>, JsonRejection>,
) -> ApiResult<api::Book> {
    let request = parse(payload)?;
    let book = Book {
        id: required("book_id", request.book_id)?,
        title: request.title,
        author: request.author,
        publication_year: request.publication_year.unwrap_or_default(),
        genre: request.genre.unwrap_or_default(),
    };
    book.ensure_required_fields()?;

    let updated = state
        .books
        .update_book(book)
        .await
        .map_err(book_error_to_api)?;
    Ok(Json(book_to_api(updated)))
}

pub async fn delete_book(
    State(state): State<ApiState>,
    payload: Result<Json<api::DeleteBookRequest>, JsonRejection>,
) -> ApiResult<api::BookIdResponse> {
    let request = parse(payload)?;
    let id = required("book_id", request.book_id)?;

    let book_id = state
        .books
        .delete_book(&id)
        .await
        .map_err(book_error_to_api)?;
    Ok(Json(api::BookIdResponse { book_id }))
}

pub async fn list_books(
    State(state): State<ApiState>,
    payload: Result<Json<api::ListBooksRequest>, JsonRejection>,
) -> ApiResult<api::ListBooksResponse> {
    let request = parse(payload)?;
    let filter = filter_from_parts(request.author, request.publication_year, request.genre);

    let books = state
        .books
        .list_books(&filter)
        .await
        .map_err(book_error_to_api)?;
    Ok(Json(books_to_api(books)))
}

pub async fn get_user_books(
    State(state): State<ApiState>,
    payload: Result<Json<api::GetUserBooksRequest>, JsonRejection>,
) -> ApiResult<api::ListBooksResponse> {
    let request = parse(payload)?;
    let user_id = required("user_id", request.user_id)?;
    let filter = filter_from_parts(request.author, request.publication_year, request.genre);

    let books = state
        .books
        .get_user_books(&user_id, &filter)
        .await
        .map_err(book_error_to_api)?;
    Ok(Json(books_to_api(books)))
}

pub async fn add_book_to_user(
    State(state): State<ApiState>,
    payload: Result<Json<api::UserBookRequest>, JsonRejection>,
) -> ApiResult<api::BookIdResponse> {
    let request = parse(payload)?;
    let user_id = required("user_id", request.user_id)?;
    let book_id = required("book_id", request.book_id)?;

    let book_id = state
        .books
        .add_book_to_user(&user_id, &book_id)
        .await
        .map_err(book_error_to_api)?;
    Ok(Json(api::BookIdResponse { book_id }))
}

pub async fn remove_book_from_user(
    State(state): State<ApiState>,
    payload: Result<Json<api::UserBookRequest>, JsonRejection>,
) -> ApiResult<api::BookIdResponse> {
    let request = parse(payload)?;
    let user_id = required("user_id", request.user_id)?;
    let book_id = required("book_id", request.book_id)?;

    let book_id = state
        .books
        .remove_book_from_user(&user_id, &book_id)
        .await
        .map_err(book_error_to_api)?;
    Ok(Json(api::BookIdResponse { book_id }))
}

/// Paths under the service prefix that name no method.
pub async fn unknown_method() -> ApiError {
    ApiError::not_found("Unknown method", None)
}
