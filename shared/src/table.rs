use async_trait::async_trait;
use thiserror::Error;

use crate::types::{User, UserDraft, UserPatch};

/// Failure returned by a [`UserTable`] operation.
///
/// Callers outside this crate only ever need [`TableError::message`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TableError {
    #[error("User not found: {id}")]
    NotFound { id: String },
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Backend(String),
    #[error("Malformed user record: {0}")]
    Decode(String),
}

impl TableError {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// The four operations the console performs against the remote `users` table.
///
/// Every call is a single round trip. Nothing here retries or batches.
#[async_trait]
pub trait UserTable: Send + Sync {
    /// All rows, newest `created_at` first.
    async fn list(&self) -> Result<Vec<User>, TableError>;

    /// Create one row. The table assigns `id`, `created_at` and `updated_at`.
    async fn insert(&self, draft: UserDraft) -> Result<User, TableError>;

    /// Apply the supplied fields to the row with `id` and return the full row.
    async fn update(&self, id: &str, patch: UserPatch) -> Result<User, TableError>;

    /// Remove the row with `id`. Deleting an absent row succeeds.
    async fn delete(&self, id: &str) -> Result<(), TableError>;
}

/// Timestamp written into `created_at` / `updated_at`.
///
/// Fixed precision with a `Z` suffix so stored values order lexically.
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Newest first. RFC 3339 timestamps written by this crate compare lexically.
pub(crate) fn sort_newest_first(users: &mut [User]) {
    users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
