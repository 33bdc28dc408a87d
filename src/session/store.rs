//! Session stores.
//!
//! [`SessionStore`] is the seam between the session manager and storage.
//! Both variants make creation atomic: when several callers race to create
//! the same key exactly one of them observes `created == true`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use super::types::{Session, SessionKey};
use crate::error::{AgentryError, Result};

/// Storage backend for session records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Short backend name for logs ("memory", "file").
    fn kind(&self) -> &'static str;

    /// Fetch a session. A missing session is `Ok(None)`, not an error.
    async fn get(&self, key: &SessionKey) -> Result<Option<Session>>;

    /// Create the session unless it already exists.
    ///
    /// Returns the stored record and whether this call created it.
    async fn create_if_absent(&self, key: &SessionKey) -> Result<(Session, bool)>;

    /// Record one run against an existing session.
    ///
    /// Returns `Ok(None)` when the session does not exist.
    async fn touch(&self, key: &SessionKey) -> Result<Option<Session>>;

    /// Delete a session. Returns whether it existed.
    async fn delete(&self, key: &SessionKey) -> Result<bool>;

    /// All sessions belonging to `app_name`.
    async fn list(&self, app_name: &str) -> Result<Vec<Session>>;
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-lifetime session store.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionKey, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &SessionKey) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(key).cloned())
    }

    async fn create_if_absent(&self, key: &SessionKey) -> Result<(Session, bool)> {
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(key) {
            return Ok((existing.clone(), false));
        }
        let session = Session::new(key.clone());
        sessions.insert(key.clone(), session.clone());
        Ok((session, true))
    }

    async fn touch(&self, key: &SessionKey) -> Result<Option<Session>> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.get_mut(key).map(|session| {
            session.touch();
            session.clone()
        }))
    }

    async fn delete(&self, key: &SessionKey) -> Result<bool> {
        Ok(self.sessions.write().await.remove(key).is_some())
    }

    async fn list(&self, app_name: &str) -> Result<Vec<Session>> {
        let sessions = self.sessions.read().await;
        let mut out: Vec<Session> = sessions
            .values()
            .filter(|s| s.key.app_name == app_name)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }
}

// ============================================================================
// File store
// ============================================================================

/// Durable session store: one JSON file per session.
///
/// New records are written to a temporary file and hard-linked into place,
/// so exactly one creator wins even when several processes share the
/// directory and no reader ever sees a half-written record. Updates are
/// renamed into place; concurrent updates within one process are serialized
/// per key, and a key's lock is dropped once no operation holds it.
pub struct FileSessionStore {
    dir: PathBuf,
    update_locks: Mutex<HashMap<SessionKey, Arc<Mutex<()>>>>,
}

impl FileSessionStore {
    /// Open (creating if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            update_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &SessionKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.storage_name()))
    }

    async fn lock_for(&self, key: &SessionKey) -> Arc<Mutex<()>> {
        let mut locks = self.update_locks.lock().await;
        locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the per-key lock once no other operation holds it.
    async fn release_lock(&self, key: &SessionKey, lock: Arc<Mutex<()>>) {
        let mut locks = self.update_locks.lock().await;
        // One reference in the map, one here.
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(key);
        }
    }

    #[cfg(test)]
    async fn tracked_locks(&self) -> usize {
        self.update_locks.lock().await.len()
    }

    async fn read(path: &Path) -> Result<Option<Session>> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                let session = serde_json::from_str(&content).map_err(|e| {
                    AgentryError::Session(format!("corrupt session file {}: {}", path.display(), e))
                })?;
                Ok(Some(session))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn temp_path(path: &Path) -> PathBuf {
        path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()))
    }

    async fn create_locked(&self, key: &SessionKey) -> Result<(Session, bool)> {
        let path = self.path_for(key);

        // The record is fully written before it is linked into place, and the
        // link fails if any creator got there first.
        let session = Session::new(key.clone());
        let tmp = Self::temp_path(&path);
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&session)?).await?;
        let linked = tokio::fs::hard_link(&tmp, &path).await;
        let _ = tokio::fs::remove_file(&tmp).await;

        match linked {
            Ok(()) => {
                debug!(session = %key, path = %path.display(), "Created session file");
                Ok((session, true))
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                match Self::read(&path).await? {
                    Some(existing) => Ok((existing, false)),
                    // Deleted between the failed link and the read.
                    None => Err(AgentryError::Session(format!(
                        "session {} vanished during creation",
                        key
                    ))),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn touch_locked(&self, key: &SessionKey) -> Result<Option<Session>> {
        let path = self.path_for(key);
        let Some(mut session) = Self::read(&path).await? else {
            return Ok(None);
        };
        session.touch();
        self.write_atomic(&path, &session).await?;
        Ok(Some(session))
    }

    async fn write_atomic(&self, path: &Path, session: &Session) -> Result<()> {
        let tmp = Self::temp_path(path);
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(session)?).await?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    fn kind(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &SessionKey) -> Result<Option<Session>> {
        Self::read(&self.path_for(key)).await
    }

    async fn create_if_absent(&self, key: &SessionKey) -> Result<(Session, bool)> {
        let lock = self.lock_for(key).await;
        let result = {
            let _guard = lock.lock().await;
            self.create_locked(key).await
        };
        self.release_lock(key, lock).await;
        result
    }

    async fn touch(&self, key: &SessionKey) -> Result<Option<Session>> {
        let lock = self.lock_for(key).await;
        let result = {
            let _guard = lock.lock().await;
            self.touch_locked(key).await
        };
        self.release_lock(key, lock).await;
        result
    }

    async fn delete(&self, key: &SessionKey) -> Result<bool> {
        let lock = self.lock_for(key).await;
        let result = {
            let _guard = lock.lock().await;
            match tokio::fs::remove_file(self.path_for(key)).await {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e.into()),
            }
        };
        self.release_lock(key, lock).await;
        result
    }

    async fn list(&self, app_name: &str) -> Result<Vec<Session>> {
        let mut sessions = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(stem) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(".json"))
            else {
                continue;
            };
            let Some(key) = SessionKey::from_storage_name(stem) else {
                continue;
            };
            if key.app_name != app_name {
                continue;
            }
            match Self::read(&path).await {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable session file"),
            }
        }
        sessions.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(sessions)
    }
}
