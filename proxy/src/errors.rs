use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub const INVALID_CONTENT_TYPE_MESSAGE: &str = "Content-Type must be application/json";
pub const MISSING_MESSAGE_MESSAGE: &str = "Message is required";
pub const UPSTREAM_FAILURE_MESSAGE: &str = "An error occurred processing your request";

/// Failure of one of the services a chat request depends on
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("language model call failed: {0:#}")]
    Model(anyhow::Error),

    #[error("conversation log append failed: {0:#}")]
    LogStore(anyhow::Error),
}

/// Everything that can go wrong while handling a chat request
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("request body is not JSON")]
    InvalidContentType,

    #[error("request has no message")]
    MissingMessage,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl ChatError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidContentType | Self::MissingMessage => StatusCode::BAD_REQUEST,
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the caller. Upstream failures all read the same.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidContentType => INVALID_CONTENT_TYPE_MESSAGE,
            Self::MissingMessage => MISSING_MESSAGE_MESSAGE,
            Self::Upstream(_) => UPSTREAM_FAILURE_MESSAGE,
        }
    }
}

/// Error body returned to HTTP callers
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        if let Self::Upstream(cause) = &self {
            error!(error = %cause, "Error processing message");
        }

        let body = Json(ErrorResponse {
            error: self.public_message(),
        });
        (self.status_code(), body).into_response()
    }
}
