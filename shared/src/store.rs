//! Client-side view of the `users` table.
//!
//! [`UserStore`] owns the list the console renders, a loading flag and a single
//! error slot, and keeps the list in step with the last confirmed server
//! response. Local state only changes after the table answers; nothing is
//! applied optimistically.
//!
//! Operations on one store are serialized: each holds the operation lock until
//! its round trip completes, so overlapping calls run in arrival order. Reads
//! never wait on that lock. State is published through a `watch` channel and
//! [`UserStore::state`] returns a snapshot at any moment, including mid-refresh.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use crate::table::{TableError, UserTable};
use crate::types::{User, UserDraft, UserPatch};

const REFRESH_FALLBACK: &str = "An error occurred";
const CREATE_FALLBACK: &str = "Failed to create user";
const UPDATE_FALLBACK: &str = "Failed to update user";
const DELETE_FALLBACK: &str = "Failed to delete user";
const CLOSED_MESSAGE: &str = "User store is closed";

/// Everything a console renders from the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreState {
    pub records: Vec<User>,
    pub is_loading: bool,
    pub last_error: Option<String>,
}

impl Default for StoreState {
    fn default() -> Self {
        // The console shows a spinner until the first fetch lands.
        Self {
            records: Vec::new(),
            is_loading: true,
            last_error: None,
        }
    }
}

pub struct UserStore {
    table: Arc<dyn UserTable>,
    state: watch::Sender<StoreState>,
    op_lock: Mutex<()>,
    closed: AtomicBool,
}

impl UserStore {
    /// Build an idle store. Use [`UserStore::activate`] to also load the list.
    pub fn new(table: Arc<dyn UserTable>) -> Self {
        let (state, _) = watch::channel(StoreState::default());
        Self {
            table,
            state,
            op_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    /// Build a store and perform its initial refresh.
    pub async fn activate(table: Arc<dyn UserTable>) -> Arc<Self> {
        let store = Arc::new(Self::new(table));
        store.refresh().await;
        store
    }

    pub fn state(&self) -> StoreState {
        self.state.borrow().clone()
    }

    pub fn records(&self) -> Vec<User> {
        self.state.borrow().records.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.borrow().last_error.clone()
    }

    /// Receive every state change. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.state.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.receiver_count()
    }

    /// Tear the store down. Waits for the operation in flight, if any; later
    /// operations fail without reaching the table.
    pub async fn close(&self) {
        let _guard = self.op_lock.lock().await;
        self.closed.store(true, Ordering::SeqCst);
        self.state.send_modify(|s| s.is_loading = false);
        tracing::info!("User store closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Replace the list with a fresh fetch. On failure the old list stays.
    pub async fn refresh(&self) -> bool {
        let _guard = self.op_lock.lock().await;
        if self.reject_if_closed() {
            return false;
        }

        self.state.send_modify(|s| {
            s.is_loading = true;
            s.last_error = None;
        });

        match self.table.list().await {
            Ok(records) => {
                tracing::info!("Refreshed {} users", records.len());
                self.state.send_modify(|s| {
                    s.records = records;
                    s.is_loading = false;
                });
                true
            }
            Err(err) => {
                let message = error_message(&err, REFRESH_FALLBACK);
                tracing::warn!("Refresh failed: {}", message);
                self.state.send_modify(|s| {
                    s.last_error = Some(message);
                    s.is_loading = false;
                });
                false
            }
        }
    }

    /// Insert a user and put it at the top of the list.
    pub async fn create(&self, draft: UserDraft) -> Option<User> {
        let _guard = self.op_lock.lock().await;
        if self.reject_if_closed() {
            return None;
        }
        self.clear_error();

        match self.table.insert(draft).await {
            Ok(user) => {
                tracing::info!("Created user {}", user.id);
                self.state
                    .send_modify(|s| s.records.insert(0, user.clone()));
                Some(user)
            }
            Err(err) => {
                self.fail(&err, CREATE_FALLBACK);
                None
            }
        }
    }

    /// Update a user and replace the local copy in place.
    pub async fn update(&self, id: &str, patch: UserPatch) -> Option<User> {
        let _guard = self.op_lock.lock().await;
        if self.reject_if_closed() {
            return None;
        }
        self.clear_error();

        match self.table.update(id, patch).await {
            Ok(user) => {
                tracing::info!("Updated user {}", id);
                self.state.send_modify(|s| {
                    for record in s.records.iter_mut().filter(|r| r.id == id) {
                        *record = user.clone();
                    }
                });
                Some(user)
            }
            Err(err) => {
                self.fail(&err, UPDATE_FALLBACK);
                None
            }
        }
    }

    /// Delete a user. Removing an id the table no longer has still succeeds.
    pub async fn remove(&self, id: &str) -> bool {
        let _guard = self.op_lock.lock().await;
        if self.reject_if_closed() {
            return false;
        }
        self.clear_error();

        match self.table.delete(id).await {
            Ok(()) => {
                tracing::info!("Deleted user {}", id);
                self.state.send_modify(|s| s.records.retain(|r| r.id != id));
                true
            }
            Err(err) => {
                self.fail(&err, DELETE_FALLBACK);
                false
            }
        }
    }

    fn clear_error(&self) {
        self.state.send_modify(|s| s.last_error = None);
    }

    fn fail(&self, err: &TableError, fallback: &str) {
        let message = error_message(err, fallback);
        tracing::warn!("{}: {}", fallback, message);
        self.state.send_modify(|s| s.last_error = Some(message));
    }

    fn reject_if_closed(&self) -> bool {
        if !self.is_closed() {
            return false;
        }
        self.state
            .send_modify(|s| s.last_error = Some(CLOSED_MESSAGE.to_string()));
        true
    }
}

fn error_message(err: &TableError, fallback: &str) -> String {
    let message = err.message();
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}
