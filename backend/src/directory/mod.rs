//! User directory: the dual-indexed store of provisioned users.
//!
//! This module provides:
//! - `UserDirectory` trait, the contract any storage backend must honor
//! - `InMemoryUserDirectory`, the default backend

mod memory;

pub use memory::InMemoryUserDirectory;

use async_trait::async_trait;

use crate::models::user::User;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("User not found")]
    NotFound,
    #[error("User already exists: {0}")]
    IdConflict(String),
    #[error("Email already taken: {0}")]
    EmailConflict(String),
    #[error("Directory storage error: {0}")]
    Storage(String),
}

impl DirectoryError {
    /// Whether this is a uniqueness violation (possibly a benign race).
    pub fn is_conflict(&self) -> bool {
        matches!(self, DirectoryError::IdConflict(_) | DirectoryError::EmailConflict(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DirectoryError::NotFound => "not_found",
            DirectoryError::IdConflict(_) => "id_conflict",
            DirectoryError::EmailConflict(_) => "email_conflict",
            DirectoryError::Storage(_) => "storage_error",
        }
    }
}

/// Storage contract for user records, indexed by ID and by email.
///
/// Every operation must appear atomic with respect to both indexes: a
/// concurrent reader sees either the whole write or none of it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up a user by subject ID.
    async fn find_by_id(&self, id: &str) -> Result<User, DirectoryError>;

    /// Look up a user by email.
    async fn find_by_email(&self, email: &str) -> Result<User, DirectoryError>;

    /// Insert a new user. Fails without writing anything if the ID or the
    /// email is already present.
    async fn create(&self, user: User) -> Result<User, DirectoryError>;

    /// Replace an existing user, re-pointing the email index if the email
    /// changed. `created_at` is kept from the stored record.
    async fn update(&self, user: User) -> Result<User, DirectoryError>;

    /// Number of stored users.
    async fn len(&self) -> usize;
}
