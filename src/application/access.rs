//! Per-call authorization for the book RPC surface.
//!
//! Every inbound method is classified through a static table. Classification is by
//! exact method identity: a method missing from the table is treated as admin-only.

use std::collections::BTreeMap;
use std::sync::Arc;

use bookshelf_api_types::{ROLE_HEADER, methods};
use thiserror::Error;

/// Role literal granting access to admin-only methods.
pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodAccess {
    Public,
    Authenticated,
    AdminOnly,
}

impl MethodAccess {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Authenticated => "authenticated",
            Self::AdminOnly => "admin_only",
        }
    }
}

const BOOKSHELF_METHODS: &[(&str, MethodAccess)] = &[
    (methods::GET_BOOK, MethodAccess::Public),
    (methods::LIST_BOOKS, MethodAccess::Public),
    (methods::GET_USER_BOOKS, MethodAccess::Authenticated),
    (methods::ADD_BOOK_TO_USER, MethodAccess::Authenticated),
    (methods::REMOVE_BOOK_FROM_USER, MethodAccess::Authenticated),
    (methods::ADD_BOOK, MethodAccess::AdminOnly),
    (methods::UPDATE_BOOK, MethodAccess::AdminOnly),
    (methods::DELETE_BOOK, MethodAccess::AdminOnly),
];

/// Static method to classification table.
#[derive(Debug, Clone, Copy)]
pub struct AccessPolicy {
    table: &'static [(&'static str, MethodAccess)],
}

impl AccessPolicy {
    pub const fn new(table: &'static [(&'static str, MethodAccess)]) -> Self {
        Self { table }
    }

    /// Classification for every `bookshelf.BookService` method.
    pub const fn bookshelf() -> Self {
        Self::new(BOOKSHELF_METHODS)
    }

    pub fn classify(&self, method: &str) -> MethodAccess {
        self.table
            .iter()
            .find(|(name, _)| *name == method)
            .map(|(_, access)| *access)
            .unwrap_or(MethodAccess::AdminOnly)
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::bookshelf()
    }
}

/// Request-scoped key/value metadata. Keys are stored lower-cased; a key may carry
/// several values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: BTreeMap<String, Vec<String>>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .entry(key.as_ref().to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    pub fn with(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Pulls the caller's role claim out of request metadata.
pub trait RoleExtractor: Send + Sync {
    fn extract(&self, metadata: &Metadata) -> Option<String>;
}

impl<F> RoleExtractor for F
where
    F: Fn(&Metadata) -> Option<String> + Send + Sync,
{
    fn extract(&self, metadata: &Metadata) -> Option<String> {
        self(metadata)
    }
}

/// Reads the first non-blank value of a single metadata key.
#[derive(Debug, Clone)]
pub struct HeaderRoleExtractor {
    key: String,
}

impl HeaderRoleExtractor {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Default for HeaderRoleExtractor {
    fn default() -> Self {
        Self::new(ROLE_HEADER)
    }
}

impl RoleExtractor for HeaderRoleExtractor {
    fn extract(&self, metadata: &Metadata) -> Option<String> {
        metadata
            .get_all(&self.key)
            .iter()
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
            .map(str::to_string)
    }
}

/// Role resolved for an admitted call. Attached to the request context read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerRole(String);

impl CallerRole {
    pub fn new(role: impl Into<String>) -> Self {
        Self(role.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_admin(&self) -> bool {
        self.0 == ADMIN_ROLE
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessDenied {
    #[error("{reason}")]
    Unauthenticated { reason: &'static str },
    #[error("role `{role}` may not call `{method}`")]
    PermissionDenied { method: String, role: String },
}

impl AccessDenied {
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated { .. })
    }
}

/// Capability check run once per inbound call, before any orchestrator code.
#[derive(Clone)]
pub struct AccessGuard {
    policy: AccessPolicy,
    extractor: Arc<dyn RoleExtractor>,
}

impl AccessGuard {
    pub fn new(policy: AccessPolicy, extractor: Arc<dyn RoleExtractor>) -> Self {
        Self { policy, extractor }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Decide whether `method` may run for the caller described by `metadata`.
    ///
    /// Returns the resolved role, if any. Public methods never require metadata.
    pub fn check(
        &self,
        method: &str,
        metadata: Option<&Metadata>,
    ) -> Result<Option<CallerRole>, AccessDenied> {
        let access = self.policy.classify(method);
        let role = metadata
            .and_then(|metadata| self.extractor.extract(metadata))
            .map(CallerRole::new);

        match access {
            MethodAccess::Public => Ok(role),
            MethodAccess::Authenticated | MethodAccess::AdminOnly => {
                if metadata.is_none() {
                    return Err(AccessDenied::Unauthenticated {
                        reason: "metadata is not provided",
                    });
                }
                let role = role.ok_or(AccessDenied::Unauthenticated {
                    reason: "role is not provided",
                })?;
                if access == MethodAccess::AdminOnly && !role.is_admin() {
                    return Err(AccessDenied::PermissionDenied {
                        method: method.to_string(),
                        role: role.0,
                    });
                }
                Ok(Some(role))
            }
        }
    }
}

impl Default for AccessGuard {
    fn default() -> Self {
        Self::new(
            AccessPolicy::bookshelf(),
            Arc::new(HeaderRoleExtractor::default()),
        )
    }
}

impl std::fmt::Debug for AccessGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGuard")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
