//! Bookshelf: a book catalog and ownership service.
//!
//! Calls enter through the RPC router in [`infra::http`], pass the
//! [`application::access`] guard and are served by
//! [`application::books::BookService`], which keeps the speed cache in
//! [`cache`] consistent with the Postgres store in [`infra::db`].

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
