//! HTTP intake for webhook deliveries.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State, rejection::BytesRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::channels::SIGNATURE_HEADER;
use crate::pipeline::EventDispatcher;

/// Largest webhook body accepted.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<EventDispatcher>,
}

/// Build the Axum router with the webhook and health routes.
pub fn webhook_routes(dispatcher: Arc<EventDispatcher>) -> Router {
    Router::new()
        .route("/callback", post(callback))
        .route("/health", get(health))
        .with_state(AppState { dispatcher })
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "line-summon-bot"
    }))
}

/// `200 OK` once the delivery is verified and dispatched, `400` otherwise.
///
/// Bodies over the size limit are answered with `400` too.
async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> impl IntoResponse {
    let body = match body {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "Unreadable webhook body");
            return (StatusCode::BAD_REQUEST, "Bad Request");
        }
    };

    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        warn!("Webhook without signature header");
        return (StatusCode::BAD_REQUEST, "Bad Request");
    };

    match state.dispatcher.handle_webhook(&body, signature).await {
        Ok(_) => (StatusCode::OK, "OK"),
        Err(e) => {
            warn!(error = %e, "Webhook rejected");
            (StatusCode::BAD_REQUEST, "Bad Request")
        }
    }
}
