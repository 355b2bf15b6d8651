//! Inbound webhook server.
//!
//! The handler enqueues and returns immediately regardless of downstream
//! latency. Ignored or unreadable envelopes still get a success-shaped body
//! so the gateway never retry-storms us.

use super::normalizer;
use crate::inbox::InboxManager;
use axum::Router;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::Json;
use axum::routing::{get, post};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Shared webhook state.
#[derive(Clone)]
pub struct AppState {
    pub inbox: InboxManager,
}

#[derive(Serialize)]
struct WebhookResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
}

impl WebhookResponse {
    fn queued() -> Self {
        Self {
            status: "queued",
            reason: None,
        }
    }

    fn ignored(reason: &'static str) -> Self {
        Self {
            status: "ignored",
            reason: Some(reason),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    active_cycles: usize,
    buffered_senders: usize,
}

/// Build the webhook router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/webhook/evolution", post(handle_webhook))
        .route("/health", get(health))
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Serve the router until shutdown is requested.
pub async fn serve(
    bind: SocketAddr,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "webhook server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Json<WebhookResponse> {
    let Ok(Json(payload)) = payload else {
        tracing::debug!("webhook body was not JSON");
        return Json(WebhookResponse::ignored("unreadable_body"));
    };

    let Some(message) = normalizer::normalize(&payload) else {
        return Json(WebhookResponse::ignored("unsupported_or_echo"));
    };

    tracing::info!(
        sender = %message.sender,
        kind = ?message.kind,
        "webhook message accepted"
    );

    let meta = message.meta();
    state.inbox.add_message(&message.sender, &message.text, meta);
    Json(WebhookResponse::queued())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "online",
        active_cycles: state.inbox.active_cycles(),
        buffered_senders: state.inbox.buffered_senders(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SenderMeta;
    use crate::config::InboxConfig;
    use crate::test_support::{RecordingHandler, RecordingTransport};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt as _;

    fn state(handler: Arc<RecordingHandler>) -> AppState {
        AppState {
            inbox: InboxManager::new(
                InboxConfig::default(),
                handler,
                Arc::new(RecordingTransport::default()),
            ),
        }
    }

    async fn send(router: Router, body: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook/evolution")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn valid_message_is_queued() {
        let handler = Arc::new(RecordingHandler::default());
        let app = router(state(handler));

        let (status, body) = send(
            app,
            r#"{"type": "MESSAGES_UPSERT", "data": {"key": {"remoteJid": "59170009999@s.whatsapp.net"}, "message": {"conversation": "Hola"}}}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "queued");
    }

    #[tokio::test]
    async fn ignored_envelopes_return_success_shape() {
        let handler = Arc::new(RecordingHandler::default());
        let app = router(state(handler.clone()));

        let (status, body) = send(app, r#"{"type": "CONNECTION_UPDATE", "data": {}}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ignored");
        assert!(handler.batches().is_empty());
    }

    #[tokio::test]
    async fn garbage_body_returns_success_shape() {
        let handler = Arc::new(RecordingHandler::default());
        let app = router(state(handler));

        let (status, body) = send(app, "this is not json").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ignored");
        assert_eq!(body["reason"], "unreadable_body");
    }

    #[tokio::test]
    async fn health_reports_inbox_load() {
        let handler = Arc::new(RecordingHandler::default());
        let app_state = state(handler);
        app_state
            .inbox
            .add_message("59170009999", "Hola", SenderMeta::new());
        let app = router(app_state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body["status"], "online");
        assert_eq!(body["buffered_senders"], 1);
    }
}
