use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nova_core::Worksheet;

/// Format of the timestamp column, always UTC
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One chat exchange as written to the log
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub session_id: String,
    pub user_message: String,
    pub model_reply: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// A turn stamped with the current time
    pub fn new(session_id: String, user_message: String, model_reply: String) -> Self {
        Self {
            session_id,
            user_message,
            model_reply,
            timestamp: Utc::now(),
        }
    }

    /// Columns in log order: session id, message, reply, timestamp
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.session_id.clone(),
            self.user_message.clone(),
            self.model_reply.clone(),
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        ]
    }
}

/// Append-only store of chat exchanges
#[async_trait]
pub trait ConversationLogStore: Send + Sync {
    async fn append_row(&self, fields: Vec<String>) -> Result<()>;
}

/// Log store backed by a Google Sheets worksheet
#[derive(Debug)]
pub struct SheetsLogStore {
    worksheet: Worksheet,
}

impl SheetsLogStore {
    pub fn new(worksheet: Worksheet) -> Self {
        Self { worksheet }
    }
}

#[async_trait]
impl ConversationLogStore for SheetsLogStore {
    async fn append_row(&self, fields: Vec<String>) -> Result<()> {
        self.worksheet.append_row(&fields).await?;
        Ok(())
    }
}
