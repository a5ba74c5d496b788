//! Cache key derivation.

pub const BOOK_KEY_PREFIX: &str = "book:";

/// Deterministic key for a book snapshot.
pub fn book_cache_key(id: &str) -> String {
    format!("{BOOK_KEY_PREFIX}{id}")
}
