use reqwest::Client;
use tracing::debug;

use crate::config::GeminiConfig;
use crate::errors::{GeminiError, GeminiResult};
use crate::types::*;

/// Base URL of the Generative Language REST API
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Client for interacting with the Gemini API
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    /// Create a new Gemini API client
    pub fn new(config: GeminiConfig) -> GeminiResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(GeminiError::ConfigError(
                "API key is required to initialize the Gemini client".to_string(),
            ));
        }

        Ok(Self {
            client: Client::new(),
            config,
        })
    }

    /// Name of the model requests are sent to
    pub fn model_name(&self) -> &str {
        &self.config.model_name
    }

    /// Get the generateContent URL for the configured model.
    ///
    /// The API key travels in a header so it never shows up in URLs or in
    /// reqwest error messages.
    fn get_base_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model_name
        )
    }

    /// Generate content using the Gemini API
    pub async fn generate_content(
        &self,
        request: GenerateContentRequest,
    ) -> GeminiResult<GenerateContentResponse> {
        let url = self.get_base_url();
        debug!(
            model = %self.config.model_name,
            turns = request.contents.len(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GeminiError::RequestError(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.map_err(|e| {
                GeminiError::ResponseError(format!("Failed to read error response: {}", e))
            })?;

            return Err(GeminiError::HttpError {
                status_code: status.as_u16(),
                message: format!("API request failed: {}", error_body),
            });
        }

        let response_body = response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| GeminiError::ParsingError(format!("Failed to parse response: {}", e)))?;

        Ok(response_body)
    }

    /// Helper method to extract text from a response.
    ///
    /// Concatenates every text part of the first candidate.
    pub fn extract_text_from_response(
        &self,
        response: &GenerateContentResponse,
    ) -> GeminiResult<String> {
        extract_text(response)
    }
}

pub(crate) fn extract_text(response: &GenerateContentResponse) -> GeminiResult<String> {
    let candidate = response.candidates.first().ok_or_else(|| {
        match response
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
        {
            Some(reason) => GeminiError::ResponseError(format!("Prompt blocked: {}", reason)),
            None => GeminiError::ResponseError("No candidates in response".to_string()),
        }
    })?;

    let content = candidate.content.as_ref().ok_or_else(|| {
        GeminiError::ResponseError(format!(
            "No content in candidate (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        ))
    })?;

    let texts: Vec<&str> = content
        .parts
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect();

    if texts.is_empty() {
        return Err(GeminiError::ResponseError("No text in content".to_string()));
    }

    Ok(texts.concat())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let result = GeminiClient::new(GeminiConfig::new("  ", "gemini-2.0-flash"));
        assert!(matches!(result, Err(GeminiError::ConfigError(_))));
    }

    #[test]
    fn url_targets_configured_model_without_key() {
        let client =
            GeminiClient::new(GeminiConfig::new("secret-key", "gemini-2.0-flash")).unwrap();

        let url = client.get_base_url();
        assert_eq!(
            url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert!(!url.contains("secret-key"));
    }

    #[test]
    fn url_follows_configured_base() {
        let config =
            GeminiConfig::new("key", "gemini-2.0-flash").with_base_url("http://127.0.0.1:9/v1beta/");
        let client = GeminiClient::new(config).unwrap();

        assert_eq!(
            client.get_base_url(),
            "http://127.0.0.1:9/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn text_parts_are_concatenated() {
        let response = parse(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hello, "}, {"text": "I'm NOVA."}]},
                "finishReason": "STOP"
            }]
        }));

        assert_eq!(extract_text(&response).unwrap(), "Hello, I'm NOVA.");
    }

    #[test]
    fn only_first_candidate_is_used() {
        let response = parse(json!({
            "candidates": [
                {"content": {"parts": [{"text": "first"}]}},
                {"content": {"parts": [{"text": "second"}]}}
            ]
        }));

        assert_eq!(extract_text(&response).unwrap(), "first");
    }

    #[test]
    fn blocked_prompt_reports_reason() {
        let response = parse(json!({"promptFeedback": {"blockReason": "SAFETY"}}));

        let err = extract_text(&response).unwrap_err();
        assert!(err.to_string().contains("Prompt blocked: SAFETY"));
    }

    #[test]
    fn candidate_without_content_is_an_error() {
        let response = parse(json!({"candidates": [{"finishReason": "MAX_TOKENS"}]}));

        let err = extract_text(&response).unwrap_err();
        assert!(matches!(err, GeminiError::ResponseError(_)));
        assert!(err.to_string().contains("MAX_TOKENS"));
    }

    #[test]
    fn content_without_text_is_an_error() {
        let response = parse(json!({"candidates": [{"content": {"parts": [{}]}}]}));

        assert!(matches!(
            extract_text(&response),
            Err(GeminiError::ResponseError(_))
        ));
    }
}
