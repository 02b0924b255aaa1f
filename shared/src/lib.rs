pub mod types;
pub mod table;
pub mod dynamo;
pub mod memory;
pub mod store;
pub mod view;
pub mod config;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub use store::{StoreState, UserStore};
pub use table::{TableError, UserTable};

/// Shared application state
///
/// The table client is shared by the whole container. Each console session
/// gets its own [`UserStore`], so one client's loading flag and error never
/// show up in another client's view.
pub struct AppState {
    pub table: Arc<dyn UserTable>,
    sessions: Mutex<HashMap<String, Arc<UserStore>>>,
}

impl AppState {
    pub fn new(table: Arc<dyn UserTable>) -> Arc<Self> {
        Arc::new(Self {
            table,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// The store for a session, activated on first use. Without a session id
    /// the caller gets a fresh store that lives for one request.
    pub async fn session(&self, id: Option<&str>) -> Arc<UserStore> {
        let Some(id) = id else {
            return UserStore::activate(Arc::clone(&self.table)).await;
        };

        if let Some(store) = self.sessions.lock().await.get(id) {
            return Arc::clone(store);
        }

        // activate outside the lock so other sessions are not held up
        let store = UserStore::activate(Arc::clone(&self.table)).await;
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.entry(id.to_string()).or_insert_with(|| {
            tracing::info!("Opened console session {}", id);
            store
        });
        Arc::clone(entry)
    }

    /// Close and forget a session's store. Returns false for an unknown id.
    pub async fn end_session(&self, id: &str) -> bool {
        let removed = self.sessions.lock().await.remove(id);
        match removed {
            Some(store) => {
                store.close().await;
                tracing::info!("Closed console session {}", id);
                true
            }
            None => false,
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
