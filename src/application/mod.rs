//! Application services layer: access control, orchestration and event contracts.

pub mod access;
pub mod books;
pub mod error;
pub mod events;
pub mod repos;
