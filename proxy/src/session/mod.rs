//! Session management for the chat proxy
//!
//! Each session id owns its own conversation with the model, so callers with
//! different ids never see each other's turns. Sessions are created on first
//! use and dropped after a period of inactivity. The `SessionStore` trait can
//! be implemented by different storage backends.

pub mod adapters;
pub mod store;

pub use adapters::InMemorySessionStore;
pub use store::{Session, SessionHandle, SessionStore, SessionStoreError, SessionStoreRef};
