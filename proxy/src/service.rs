use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::{ChatError, UpstreamError};
use crate::log_store::{ConversationLogStore, ConversationTurn};
use crate::model::LanguageModelClient;

/// Label placed between the persona preamble and the user's message
pub const USER_LABEL: &str = "User: ";

/// A validated chat request
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<String>,
}

impl ChatRequest {
    /// Validate a decoded request body.
    ///
    /// `message` must be a non-empty string. A `sessionId` that is not a
    /// non-empty string is treated as absent.
    pub fn from_json(body: &Value) -> Result<Self, ChatError> {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .filter(|message| !message.is_empty())
            .ok_or(ChatError::MissingMessage)?;

        let session_id = body
            .get("sessionId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_owned);

        Ok(Self {
            message: message.to_owned(),
            session_id,
        })
    }
}

/// Successful reply to a chat request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
}

/// Relays chat messages to the model and logs every exchange
pub struct ChatProxyService {
    context: String,
    model: Arc<dyn LanguageModelClient>,
    log_store: Arc<dyn ConversationLogStore>,
}

impl ChatProxyService {
    pub fn new(
        context: String,
        model: Arc<dyn LanguageModelClient>,
        log_store: Arc<dyn ConversationLogStore>,
    ) -> Self {
        Self {
            context,
            model,
            log_store,
        }
    }

    /// The prompt sent for `message`: the persona preamble, then the labelled
    /// message exactly as the caller wrote it.
    pub fn build_prompt(&self, message: &str) -> String {
        format!("{}\n{}{}", self.context, USER_LABEL, message)
    }

    /// Validate `body`, query the model, log the exchange and return the reply
    pub async fn handle_chat_request(&self, body: &Value) -> Result<ChatResponse, ChatError> {
        let request = ChatRequest::from_json(body)?;

        let session_id = match request.session_id {
            Some(id) => id,
            None => {
                let id = new_session_id();
                debug!(session_id = %id, "Generated session id");
                id
            }
        };

        let prompt = self.build_prompt(&request.message);
        let reply = self
            .model
            .send_message(&session_id, &prompt)
            .await
            .map_err(UpstreamError::Model)?;

        let turn = ConversationTurn::new(session_id.clone(), request.message, reply.clone());
        self.log_store
            .append_row(turn.to_row())
            .await
            .map_err(UpstreamError::LogStore)?;

        info!(
            session_id = %session_id,
            reply_len = reply.len(),
            "Chat request completed"
        );

        Ok(ChatResponse {
            response: reply,
            session_id,
        })
    }
}

/// A fresh random session id
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}
