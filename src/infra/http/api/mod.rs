pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod state;

pub use state::ApiState;

use axum::{Router, middleware as axum_middleware, routing::post};
use bookshelf_api_types::methods;

use crate::infra::http::RouterState;

/// One `POST` route per RPC method, all behind the access guard.
///
/// The guard also wraps the fallback, so an unknown method is classified
/// (as admin-only) before it can be reported as missing.
pub fn build_api_router(state: RouterState) -> Router<RouterState> {
    let guard_state = state.api.clone();

    Router::new()
        .route(methods::ADD_BOOK, post(handlers::add_book))
        .route(methods::GET_BOOK, post(handlers::get_book))
        .route(methods::UPDATE_BOOK, post(handlers::update_book))
        .route(methods::DELETE_BOOK, post(handlers::delete_book))
        .route(methods::LIST_BOOKS, post(handlers::list_books))
        .route(methods::GET_USER_BOOKS, post(handlers::get_user_books))
        .route(methods::ADD_BOOK_TO_USER, post(handlers::add_book_to_user))
        .route(
            methods::REMOVE_BOOK_FROM_USER,
            post(handlers::remove_book_from_user),
        )
        .fallback(handlers::unknown_method)
        .layer(axum_middleware::from_fn_with_state(
            guard_state,
            middleware::guard_access,
        ))
}
