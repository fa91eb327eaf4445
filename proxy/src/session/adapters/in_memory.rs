use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::session::store::{Session, SessionHandle, SessionStore, SessionStoreError};

#[derive(Debug)]
struct Entry {
    handle: SessionHandle,
    last_access: DateTime<Utc>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        // A clock that went backwards yields a negative span, which never expires.
        now.signed_duration_since(self.last_access)
            .to_std()
            .map(|idle| idle > ttl)
            .unwrap_or(false)
    }
}

/// In-memory implementation of SessionStore with idle expiry
#[derive(Debug)]
pub struct InMemorySessionStore {
    /// Thread-safe storage of sessions
    sessions: RwLock<HashMap<String, Entry>>,
    /// How long a session may sit idle before it is dropped
    ttl: Duration,
}

impl InMemorySessionStore {
    /// Create a new InMemorySessionStore whose sessions expire after `ttl` of inactivity
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    fn get_or_create_at(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionHandle, SessionStoreError> {
        let mut sessions = self.sessions.write().map_err(|e| {
            SessionStoreError::StorageError(format!("Failed to acquire write lock: {}", e))
        })?;

        if let Some(entry) = sessions.get_mut(id) {
            if !entry.is_expired(now, self.ttl) {
                entry.last_access = now;
                return Ok(Arc::clone(&entry.handle));
            }
            debug!(session_id = id, "Session expired, starting a new conversation");
        }

        let handle = Arc::new(Mutex::new(Session::new(id.to_string())));
        sessions.insert(
            id.to_string(),
            Entry {
                handle: Arc::clone(&handle),
                last_access: now,
            },
        );
        debug!(session_id = id, "Created session");

        Ok(handle)
    }

    fn touch_at(&self, id: &str, now: DateTime<Utc>) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.write().map_err(|e| {
            SessionStoreError::StorageError(format!("Failed to acquire write lock: {}", e))
        })?;

        let entry = sessions
            .get_mut(id)
            .ok_or_else(|| SessionStoreError::NotFound(id.to_string()))?;
        entry.last_access = now;
        Ok(())
    }

    fn cleanup_expired_at(&self, now: DateTime<Utc>) -> Result<usize, SessionStoreError> {
        let mut sessions = self.sessions.write().map_err(|e| {
            SessionStoreError::StorageError(format!("Failed to acquire write lock: {}", e))
        })?;

        let before = sessions.len();
        sessions.retain(|id, entry| {
            let keep = !entry.is_expired(now, self.ttl);
            if !keep {
                debug!(session_id = %id, "Cleaned up expired session");
            }
            keep
        });

        let count = before - sessions.len();
        if count > 0 {
            info!("Cleaned up {} expired sessions", count);
        }

        Ok(count)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, id: &str) -> Result<SessionHandle, SessionStoreError> {
        self.get_or_create_at(id, Utc::now())
    }

    async fn touch(&self, id: &str) -> Result<(), SessionStoreError> {
        self.touch_at(id, Utc::now())
    }

    async fn delete_session(&self, id: &str) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.write().map_err(|e| {
            SessionStoreError::StorageError(format!("Failed to acquire write lock: {}", e))
        })?;

        if sessions.remove(id).is_none() {
            return Err(SessionStoreError::NotFound(id.to_string()));
        }

        debug!(session_id = id, "Deleted session");
        Ok(())
    }

    async fn cleanup_expired_sessions(&self) -> Result<usize, SessionStoreError> {
        self.cleanup_expired_at(Utc::now())
    }

    async fn session_count(&self) -> Result<usize, SessionStoreError> {
        let sessions = self.sessions.read().map_err(|e| {
            SessionStoreError::StorageError(format!("Failed to acquire read lock: {}", e))
        })?;
        Ok(sessions.len())
    }
}
