//! Session manager: idempotent session lifecycle on top of a [`SessionStore`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use super::store::SessionStore;
use super::types::{Session, SessionKey};
use crate::error::Result;

/// Binds a session store to one application (agent) name.
///
/// # Thread Safety
///
/// `ensure_exists` may be called concurrently for the same key: the first
/// caller creates the record, the others observe it. Only one underlying
/// record is ever created.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    app_name: String,
    creation_locks: Mutex<HashMap<SessionKey, Arc<Mutex<()>>>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, app_name: impl Into<String>) -> Self {
        Self {
            store,
            app_name: app_name.into(),
            creation_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Backend kind of the bound store.
    pub fn store_kind(&self) -> &'static str {
        self.store.kind()
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Key for a user/session pair under this manager's application.
    pub fn key(&self, user_id: &str, session_id: &str) -> SessionKey {
        SessionKey::new(&self.app_name, user_id, session_id)
    }

    /// Make sure the session exists, creating it on first reference.
    ///
    /// A missing session is the trigger to create, not an error; only store
    /// failures are returned as errors.
    pub async fn ensure_exists(&self, user_id: &str, session_id: &str) -> Result<Session> {
        let key = self.key(user_id, session_id);

        if let Some(existing) = self.store.get(&key).await? {
            debug!(session = %key, "Session exists");
            return Ok(existing);
        }

        let lock = {
            let mut locks = self.creation_locks.lock().await;
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = lock.lock().await;

        let (session, created) = self.store.create_if_absent(&key).await?;
        if created {
            info!(session = %key, store = self.store.kind(), "Created session");
        }

        // The lock entry is only needed while the record does not exist yet.
        self.creation_locks.lock().await.remove(&key);
        Ok(session)
    }

    /// Record a completed run. Returns `None` if the session was deleted meanwhile.
    pub async fn record_turn(&self, user_id: &str, session_id: &str) -> Result<Option<Session>> {
        self.store.touch(&self.key(user_id, session_id)).await
    }

    pub async fn get(&self, user_id: &str, session_id: &str) -> Result<Option<Session>> {
        self.store.get(&self.key(user_id, session_id)).await
    }

    /// Explicitly delete a session.
    pub async fn delete(&self, user_id: &str, session_id: &str) -> Result<bool> {
        let deleted = self.store.delete(&self.key(user_id, session_id)).await?;
        if deleted {
            info!(app = %self.app_name, user = user_id, session = session_id, "Deleted session");
        }
        Ok(deleted)
    }

    /// All sessions of this application.
    pub async fn list(&self) -> Result<Vec<Session>> {
        self.store.list(&self.app_name).await
    }
}
