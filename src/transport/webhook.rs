//! Webhook delivery
//!
//! Telegram POSTs one `Update` per request to `/telegram/webhook`.

use super::telegram::Update;
use crate::runtime::EventSink;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Clone)]
struct WebhookState {
    sink: Arc<dyn EventSink>,
    secret: Option<Arc<str>>,
}

pub fn create_router(sink: Arc<dyn EventSink>, secret: Option<String>) -> Router {
    Router::new()
        .route("/telegram/webhook", post(receive_update))
        .route("/healthz", get(healthz))
        .with_state(WebhookState {
            sink,
            secret: secret.map(Arc::from),
        })
}

async fn healthz() -> &'static str {
    "ok"
}

async fn receive_update(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    if let Some(expected) = state.secret.as_deref() {
        let provided = headers
            .get(SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if provided != expected {
            tracing::warn!("Webhook call with missing or wrong secret token");
            return Err(AppError::Unauthorized);
        }
    }

    let update: Update = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid update: {e}")))?;
    let update_id = update.update_id;

    match update.into_inbound() {
        Some(event) => state.sink.deliver(event).await,
        None => tracing::debug!(update_id, "Ignoring unsupported update"),
    }
    Ok(StatusCode::OK)
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    Unauthorized,
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Invalid secret token".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ChatId;
    use crate::transport::{InboundEvent, InboundKind};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<InboundEvent>>,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn deliver(&self, event: InboundEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    const UPDATE: &str =
        r#"{"update_id":1,"message":{"message_id":3,"chat":{"id":77},"text":"/showtasks"}}"#;

    fn post_update(body: &str, secret: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/telegram/webhook")
            .header("content-type", "application/json");
        if let Some(secret) = secret {
            builder = builder.header(SECRET_HEADER, secret);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_update_is_delivered() {
        let sink = Arc::new(RecordingSink::default());
        let app = create_router(sink.clone(), Some("s3cret".to_string()));

        let response = app.oneshot(post_update(UPDATE, Some("s3cret"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].chat_id, ChatId(77));
        assert!(matches!(&events[0].kind, InboundKind::Text { text, .. } if text == "/showtasks"));
    }

    #[tokio::test]
    async fn test_wrong_secret_is_rejected() {
        let sink = Arc::new(RecordingSink::default());
        let app = create_router(sink.clone(), Some("s3cret".to_string()));

        let response = app.oneshot(post_update(UPDATE, Some("nope"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(sink.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_secret_configured_accepts_any_caller() {
        let sink = Arc::new(RecordingSink::default());
        let app = create_router(sink.clone(), None);

        let response = app.oneshot(post_update(UPDATE, None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(sink.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let app = create_router(Arc::new(RecordingSink::default()), None);

        let response = app.oneshot(post_update("{not json", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_healthz() {
        let app = create_router(Arc::new(RecordingSink::default()), None);

        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }
}
