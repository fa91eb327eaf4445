use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use nova_core::ChatSession;
use thiserror::Error;
use tokio::sync::Mutex;

/// Error type for session store operations
#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// Session not found
    #[error("Session not found: {0}")]
    NotFound(String),
    /// Error occurred during a store operation
    #[error("Storage error: {0}")]
    StorageError(String),
}

/// Session data structure
#[derive(Debug)]
pub struct Session {
    /// Unique session identifier
    pub id: String,
    /// Conversation with the model for this session only
    pub chat: ChatSession,
}

impl Session {
    /// Create a new session with the given ID and an empty conversation
    pub fn new(id: String) -> Self {
        Self {
            id,
            chat: ChatSession::new(),
        }
    }
}

/// Shared handle to one session.
///
/// The mutex is held for the duration of a model call, which serializes
/// concurrent requests that carry the same session id.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Trait defining the interface for session stores
#[async_trait]
pub trait SessionStore: Send + Sync + Debug {
    /// Get the session for `id`, creating it on first use or after it expired.
    /// Every call refreshes the session's expiry.
    async fn get_or_create(&self, id: &str) -> Result<SessionHandle, SessionStoreError>;

    /// Mark the session as active now, restarting its idle period
    async fn touch(&self, id: &str) -> Result<(), SessionStoreError>;

    /// Delete a session by ID
    async fn delete_session(&self, id: &str) -> Result<(), SessionStoreError>;

    /// Delete expired sessions, returning how many were removed
    async fn cleanup_expired_sessions(&self) -> Result<usize, SessionStoreError>;

    /// Number of sessions currently held, expired or not
    async fn session_count(&self) -> Result<usize, SessionStoreError>;
}

/// Type alias for Arc-wrapped SessionStore trait objects
pub type SessionStoreRef = Arc<dyn SessionStore>;
