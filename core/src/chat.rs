use crate::client::GeminiClient;
use crate::errors::GeminiResult;
use crate::types::{Content, GenerateContentRequest};

/// Exchanges a session replays by default before the oldest are dropped
pub const DEFAULT_MAX_TURNS: usize = 20;

/// Multi-turn conversation with a Gemini model.
///
/// Every call replays the accumulated history followed by the new user turn.
/// The history only grows when a call succeeds, so a failed request leaves the
/// conversation exactly as it was. Once more than `max_turns` exchanges are
/// held, the oldest exchange is dropped.
#[derive(Debug, Clone)]
pub struct ChatSession {
    history: Vec<Content>,
    max_turns: usize,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::with_max_turns(DEFAULT_MAX_TURNS)
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_turns(max_turns: usize) -> Self {
        Self {
            history: Vec::new(),
            max_turns,
        }
    }

    /// Turns exchanged so far, oldest first
    pub fn history(&self) -> &[Content] {
        &self.history
    }

    /// Number of completed user/model exchanges
    pub fn turn_count(&self) -> usize {
        self.history.len() / 2
    }

    /// Build the request for `prompt` on top of the current history
    pub fn build_request(&self, prompt: &str) -> GenerateContentRequest {
        let mut contents = self.history.clone();
        contents.push(Content::user(prompt));

        GenerateContentRequest { contents }
    }

    /// Send `prompt` and record the exchange on success
    pub async fn send_message(&mut self, client: &GeminiClient, prompt: &str) -> GeminiResult<String> {
        let request = self.build_request(prompt);
        let response = client.generate_content(request).await?;
        let reply = client.extract_text_from_response(&response)?;

        self.record_turn(prompt, &reply);
        Ok(reply)
    }

    fn record_turn(&mut self, prompt: &str, reply: &str) {
        self.history.push(Content::user(prompt));
        self.history.push(Content::model(reply));

        let excess = self.history.len().saturating_sub(self.max_turns * 2);
        if excess > 0 {
            self.history.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeminiConfig;
    use crate::errors::GeminiError;
    use crate::types::{MODEL_ROLE, USER_ROLE};
    use serde_json::{json, Value};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    fn reply(text: &str) -> (u16, String) {
        let body = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP"
            }]
        });
        (200, body.to_string())
    }

    /// Read one HTTP request and return its body
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return String::new();
            }
            buf.extend_from_slice(&chunk[..n]);

            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                let length = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return String::from_utf8_lossy(&buf[end + 4..end + 4 + length]).into_owned();
                }
            }
        }
    }

    /// Answer each connection with the next canned response, reporting request bodies
    async fn stub_server(responses: Vec<(u16, String)>) -> (String, mpsc::UnboundedReceiver<Value>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let request = read_request(&mut socket).await;
                let _ = tx.send(serde_json::from_str(&request).unwrap_or(Value::Null));

                let response = format!(
                    "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}/v1beta", addr), rx)
    }

    fn client_for(base_url: &str) -> GeminiClient {
        GeminiClient::new(GeminiConfig::new("test-key", "gemini-2.0-flash").with_base_url(base_url))
            .unwrap()
    }

    #[test]
    fn first_request_holds_only_the_prompt() {
        let chat = ChatSession::new();
        let request = chat.build_request("Hello");

        assert_eq!(request.contents, vec![Content::user("Hello")]);
        assert_eq!(chat.turn_count(), 0);
    }

    #[test]
    fn history_is_replayed_before_the_new_prompt() {
        let mut chat = ChatSession::new();
        chat.record_turn("Hi", "Hello! How can I help?");

        let request = chat.build_request("Tell me about pricing");
        let roles: Vec<_> = request
            .contents
            .iter()
            .map(|c| c.role.as_deref().unwrap())
            .collect();

        assert_eq!(roles, vec![USER_ROLE, MODEL_ROLE, USER_ROLE]);
        assert_eq!(request.contents[2], Content::user("Tell me about pricing"));
        assert_eq!(chat.turn_count(), 1);
    }

    #[test]
    fn building_a_request_does_not_mutate_history() {
        let mut chat = ChatSession::new();
        chat.record_turn("Hi", "Hello!");

        let _ = chat.build_request("unsent");
        assert_eq!(chat.history().len(), 2);
    }

    #[test]
    fn oldest_exchanges_are_dropped_past_the_cap() {
        let mut chat = ChatSession::with_max_turns(2);
        chat.record_turn("one", "1");
        chat.record_turn("two", "2");
        chat.record_turn("three", "3");

        assert_eq!(chat.turn_count(), 2);
        assert_eq!(chat.history()[0], Content::user("two"));
        assert_eq!(chat.history()[3], Content::model("3"));
    }

    #[tokio::test]
    async fn success_adds_two_turns_and_failure_adds_none() {
        let (base_url, mut requests) = stub_server(vec![
            reply("Hello! I'm NOVA."),
            (500, json!({"error": {"message": "internal"}}).to_string()),
        ])
        .await;
        let client = client_for(&base_url);
        let mut chat = ChatSession::new();

        let text = chat.send_message(&client, "Hello").await.unwrap();
        assert_eq!(text, "Hello! I'm NOVA.");
        assert_eq!(chat.history().len(), 2);
        assert_eq!(chat.history()[1], Content::model("Hello! I'm NOVA."));

        let err = chat.send_message(&client, "Still there?").await.unwrap_err();
        assert!(matches!(err, GeminiError::HttpError { status_code: 500, .. }));
        assert_eq!(chat.history().len(), 2);

        let first = requests.recv().await.unwrap();
        let second = requests.recv().await.unwrap();
        assert_eq!(first["contents"].as_array().unwrap().len(), 1);
        assert_eq!(second["contents"].as_array().unwrap().len(), 3);
        assert_eq!(second["contents"][0]["parts"][0]["text"], "Hello");
    }

    #[tokio::test]
    async fn unusable_reply_leaves_history_unchanged() {
        let (base_url, _requests) = stub_server(vec![(
            200,
            json!({"promptFeedback": {"blockReason": "SAFETY"}}).to_string(),
        )])
        .await;
        let client = client_for(&base_url);
        let mut chat = ChatSession::new();

        let err = chat.send_message(&client, "Hello").await.unwrap_err();
        assert!(matches!(err, GeminiError::ResponseError(_)));
        assert!(chat.history().is_empty());
    }
}
