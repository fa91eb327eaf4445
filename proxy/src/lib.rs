//! Chat proxy daemon: relays chat messages to Gemini and logs every exchange
//! to a Google Sheets worksheet.

pub mod errors;
pub mod http_server;
pub mod log_store;
pub mod model;
pub mod service;
pub mod session;

pub use errors::{ChatError, UpstreamError};
pub use service::{ChatProxyService, ChatRequest, ChatResponse};
