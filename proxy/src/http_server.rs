use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, Method},
    routing::post,
    Json, Router,
};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::errors::ChatError;
use crate::service::{ChatProxyService, ChatResponse};

/// Application state shared with all routes
#[derive(Clone)]
pub struct AppState {
    service: Arc<ChatProxyService>,
}

/// Build the router serving `POST /chat`
pub fn router(service: Arc<ChatProxyService>) -> Router {
    let state = AppState { service };

    // Any origin may call /chat and send a Content-Type header
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/chat", post(handle_chat))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server and serve until Ctrl-C
pub async fn run_server(service: Arc<ChatProxyService>, addr: SocketAddr) -> anyhow::Result<()> {
    info!("Starting HTTP server on {}", addr);

    axum::Server::try_bind(&addr)
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?
        .serve(router(service).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server failed: {}", e))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Handler for chat requests
async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ChatResponse>, ChatError> {
    let Json(body) = payload.map_err(|rejection| {
        debug!(reason = %rejection, "Rejected chat request body");
        ChatError::InvalidContentType
    })?;

    state.service.handle_chat_request(&body).await.map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::tests::{service_with, RecordingLog, RecordingModel};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    fn test_app(
        model: RecordingModel,
        log: RecordingLog,
    ) -> (Router, Arc<RecordingModel>, Arc<RecordingLog>) {
        let model = Arc::new(model);
        let log = Arc::new(log);
        let service = service_with(Arc::clone(&model), Arc::clone(&log));
        (router(Arc::new(service)), model, log)
    }

    fn post_chat(content_type: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/chat");
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn valid_request_returns_reply_and_session() {
        let (app, _model, log) = test_app(RecordingModel::default(), RecordingLog::default());

        let (status, body) = send(
            app,
            post_chat(Some("application/json"), r#"{"message": "Hello", "sessionId": "abc"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"response": "Hello! I'm NOVA.", "sessionId": "abc"}));
        assert_eq!(log.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn non_json_content_type_is_rejected() {
        for content_type in [Some("text/plain"), Some("application/x-www-form-urlencoded"), None] {
            let (app, model, _log) = test_app(RecordingModel::default(), RecordingLog::default());

            let (status, body) = send(app, post_chat(content_type, r#"{"message": "Hello"}"#)).await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, json!({"error": "Content-Type must be application/json"}));
            assert!(model.calls.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn malformed_json_is_rejected_as_content_type_error() {
        let (app, _model, _log) = test_app(RecordingModel::default(), RecordingLog::default());

        let (status, body) = send(app, post_chat(Some("application/json"), "{\"message\": ")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Content-Type must be application/json"}));
    }

    #[tokio::test]
    async fn empty_message_is_rejected_without_side_effects() {
        let (app, model, log) = test_app(RecordingModel::default(), RecordingLog::default());

        let (status, body) = send(app, post_chat(Some("application/json"), r#"{"message": ""}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Message is required"}));
        assert!(model.calls.lock().unwrap().is_empty());
        assert!(log.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn upstream_failure_is_masked() {
        let failing_model = RecordingModel {
            fail: true,
            ..Default::default()
        };
        let failing_log = RecordingLog {
            fail: true,
            ..Default::default()
        };

        for (model, log) in [
            (failing_model, RecordingLog::default()),
            (RecordingModel::default(), failing_log),
        ] {
            let (app, _model, _log) = test_app(model, log);

            let (status, body) =
                send(app, post_chat(Some("application/json"), r#"{"message": "Hello"}"#)).await;

            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body, json!({"error": "An error occurred processing your request"}));
        }
    }

    #[tokio::test]
    async fn cors_preflight_allows_any_origin() {
        let (app, _model, _log) = test_app(RecordingModel::default(), RecordingLog::default());

        let request = Request::builder()
            .method("OPTIONS")
            .uri("/chat")
            .header(header::ORIGIN, "https://shop.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert!(response.status().is_success());
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
        let allowed = response.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS]
            .to_str()
            .unwrap()
            .to_ascii_lowercase();
        assert!(allowed.contains("content-type"));
    }
}
