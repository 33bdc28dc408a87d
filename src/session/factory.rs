//! Session backend selection.

use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use super::store::{FileSessionStore, InMemorySessionStore, SessionStore};
use crate::config::{SessionBackend, SessionSettings};

/// Chooses the session store an agent binds to.
///
/// The decision depends only on the settings the factory was built with, so
/// it is stable for the lifetime of the process. Stores are pooled: every
/// agent using a backend shares the same store instance.
pub struct SessionServiceFactory {
    settings: SessionSettings,
    memory: Arc<InMemorySessionStore>,
    file: Mutex<Option<Arc<FileSessionStore>>>,
}

impl SessionServiceFactory {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            memory: Arc::new(InMemorySessionStore::new()),
            file: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Store for `agent_name` and the backend actually selected.
    ///
    /// If the file backend is configured but its directory cannot be opened,
    /// logs a warning and falls back to the in-memory store.
    pub fn create_session_service(
        &self,
        agent_name: &str,
    ) -> (Arc<dyn SessionStore>, SessionBackend) {
        match self.settings.backend {
            SessionBackend::Memory => {
                info!(agent = agent_name, "Using in-memory session store");
                (self.memory.clone(), SessionBackend::Memory)
            }
            SessionBackend::File => match self.file_store() {
                Ok(store) => {
                    info!(agent = agent_name, dir = %store.dir().display(), "Using file session store");
                    (store, SessionBackend::File)
                }
                Err(e) => {
                    warn!(agent = agent_name, error = %e, "File session store unavailable; falling back to in-memory");
                    (self.memory.clone(), SessionBackend::Memory)
                }
            },
        }
    }

    fn file_store(&self) -> crate::error::Result<Arc<FileSessionStore>> {
        let mut slot = self
            .file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(store) = slot.as_ref() {
            return Ok(store.clone());
        }
        let store = Arc::new(FileSessionStore::new(self.settings.resolved_dir())?);
        *slot = Some(store.clone());
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_backend_is_shared() {
        let factory = SessionServiceFactory::new(SessionSettings::default());
        let (a, kind_a) = factory.create_session_service("A");
        let (b, _) = factory.create_session_service("B");
        assert_eq!(kind_a, SessionBackend::Memory);
        assert_eq!(a.kind(), "memory");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_file_backend() {
        let dir = TempDir::new().unwrap();
        let factory = SessionServiceFactory::new(SessionSettings {
            backend: SessionBackend::File,
            dir: Some(dir.path().join("sessions")),
        });
        let (a, kind) = factory.create_session_service("A");
        let (b, _) = factory.create_session_service("B");
        assert_eq!(kind, SessionBackend::File);
        assert_eq!(a.kind(), "file");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(dir.path().join("sessions").is_dir());
    }

    #[test]
    fn test_unusable_dir_falls_back_to_memory() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();
        let factory = SessionServiceFactory::new(SessionSettings {
            backend: SessionBackend::File,
            dir: Some(blocker.join("sessions")),
        });
        let (store, kind) = factory.create_session_service("A");
        assert_eq!(kind, SessionBackend::Memory);
        assert_eq!(store.kind(), "memory");
    }
}
