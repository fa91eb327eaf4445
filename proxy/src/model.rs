use anyhow::Result;
use async_trait::async_trait;
use nova_core::GeminiClient;
use tracing::debug;

use crate::session::SessionStoreRef;

/// A language model that keeps a conversation per session id
#[async_trait]
pub trait LanguageModelClient: Send + Sync {
    /// Send `prompt` as the next user turn of `session_id`'s conversation
    async fn send_message(&self, session_id: &str, prompt: &str) -> Result<String>;
}

/// Gemini-backed model holding one chat history per session
#[derive(Debug)]
pub struct GeminiChatModel {
    client: GeminiClient,
    sessions: SessionStoreRef,
}

impl GeminiChatModel {
    pub fn new(client: GeminiClient, sessions: SessionStoreRef) -> Self {
        Self { client, sessions }
    }
}

#[async_trait]
impl LanguageModelClient for GeminiChatModel {
    async fn send_message(&self, session_id: &str, prompt: &str) -> Result<String> {
        let handle = self.sessions.get_or_create(session_id).await?;
        let mut session = handle.lock().await;

        debug!(
            session_id,
            model = self.client.model_name(),
            prior_turns = session.chat.turn_count(),
            "Sending message to Gemini"
        );

        let result = session.chat.send_message(&self.client, prompt).await;

        // Idle time counts from the end of the call
        if let Err(e) = self.sessions.touch(session_id).await {
            debug!(session_id, error = %e, "Session left the store during the call");
        }

        Ok(result?)
    }
}
