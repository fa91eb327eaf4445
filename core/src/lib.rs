// Core functionality shared by the chat proxy:
// - API client for Gemini and chat-session history
// - Google service-account auth and Sheets client
// - Configuration loading
// - Shared error types

// Export client module - API client for Gemini
pub mod client;
pub use client::*;

// Export types module - Request/response data structures
pub mod types;
pub use types::*;

// Export chat module - Conversation history replayed on every call
pub mod chat;
pub use chat::ChatSession;

// Export auth module - Service-account OAuth tokens
pub mod auth;
pub use auth::{ServiceAccountAuth, ServiceAccountKey};

// Export sheets module - Append-only worksheet access
pub mod sheets;
pub use sheets::{SheetsClient, Worksheet};

// Export config module - Configuration loading
pub mod config;
pub use crate::config::*;

// Export errors module - Shared error types
pub mod errors;
pub use errors::*;
