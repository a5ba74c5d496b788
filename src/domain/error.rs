use thiserror::Error;

/// Book invariant violations, raised before the store is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("`{field}` is required")]
    MissingField { field: &'static str },
}

impl DomainError {
    pub fn missing(field: &'static str) -> Self {
        Self::MissingField { field }
    }
}
