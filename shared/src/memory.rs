use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::table::{now_timestamp, sort_newest_first, TableError, UserTable};
use crate::types::{User, UserDraft, UserPatch};

/// Which table operation an injected failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableOp {
    List,
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Default)]
struct Inner {
    // newest first; ties on created_at keep that order
    rows: Vec<User>,
    failures: HashMap<TableOp, String>,
}

/// In-memory users table for local runs and tests.
///
/// Clones share the same rows.
#[derive(Clone, Debug, Default)]
pub struct MemoryUserTable {
    inner: Arc<Mutex<Inner>>,
    latency: Option<Duration>,
}

impl MemoryUserTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Vec<User>) -> Self {
        let table = Self::new();
        {
            let mut inner = table.lock();
            inner.rows = users;
            sort_newest_first(&mut inner.rows);
        }
        table
    }

    /// Every call sleeps for `latency` before touching the rows.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the next call of `op` fail with a backend error carrying `message`.
    pub fn fail_next(&self, op: TableOp, message: impl Into<String>) {
        self.lock().failures.insert(op, message.into());
    }

    /// Snapshot of the stored rows, newest first.
    pub fn rows(&self) -> Vec<User> {
        self.lock().rows.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn begin(&self, op: TableOp) -> Result<MutexGuard<'_, Inner>, TableError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut inner = self.lock();
        let failure = inner.failures.remove(&op);
        match failure {
            Some(message) => Err(TableError::Backend(message)),
            None => Ok(inner),
        }
    }
}

#[async_trait]
impl UserTable for MemoryUserTable {
    async fn list(&self) -> Result<Vec<User>, TableError> {
        let inner = self.begin(TableOp::List).await?;
        Ok(inner.rows.clone())
    }

    async fn insert(&self, draft: UserDraft) -> Result<User, TableError> {
        let draft = draft.normalize()?;
        let mut inner = self.begin(TableOp::Insert).await?;

        let now = now_timestamp();
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            name: draft.name,
            email: draft.email,
            role: draft.role,
            department: draft.department,
            status: draft.status.unwrap_or_default(),
            avatar: draft.avatar,
            created_at: now.clone(),
            updated_at: now,
        };
        inner.rows.insert(0, user.clone());
        Ok(user)
    }

    async fn update(&self, id: &str, patch: UserPatch) -> Result<User, TableError> {
        let patch = patch.normalize()?;
        let mut inner = self.begin(TableOp::Update).await?;

        let row = inner
            .rows
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| TableError::NotFound { id: id.to_string() })?;
        row.apply(&patch);
        row.updated_at = now_timestamp();
        Ok(row.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), TableError> {
        let mut inner = self.begin(TableOp::Delete).await?;
        inner.rows.retain(|u| u.id != id);
        Ok(())
    }
}
