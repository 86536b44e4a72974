use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::handler::WebhookHandler;
use crate::line::{event, signature};
use crate::store::{ReminderStatus, ReminderStore};

#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<WebhookHandler>,
    pub store: Arc<ReminderStore>,
    pub channel_secret: Arc<str>,
    pub name: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/callback", post(handle_callback))
        .route("/health", get(handle_health))
        .with_state(state)
}

async fn handle_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let Some(sig) = headers.get(signature::HEADER).and_then(|v| v.to_str().ok()) else {
        tracing::warn!("Webhook call without signature header");
        return (StatusCode::BAD_REQUEST, "Missing signature");
    };
    if !signature::verify(&state.channel_secret, &body, sig) {
        tracing::warn!("Webhook call with invalid signature");
        return (StatusCode::BAD_REQUEST, "Invalid signature");
    }
    tracing::debug!("Request body: {}", String::from_utf8_lossy(&body));

    let payload = match event::parse(&body) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("Malformed webhook body: {e}");
            return (StatusCode::BAD_REQUEST, "Malformed body");
        }
    };

    tracing::debug!(destination = ?payload.destination, "{} events", payload.events.len());
    for ev in &payload.events {
        match ev.as_text() {
            Some(text_event) => {
                state.handler.handle(&text_event).await;
            }
            None => tracing::debug!("Ignoring {} event", ev.type_),
        }
    }

    (StatusCode::OK, "OK")
}

async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let records = state.store.snapshot();
    let pending = records
        .iter()
        .filter(|(_, r)| r.status == ReminderStatus::Pending)
        .count();
    Json(serde_json::json!({
        "status": "ok",
        "name": state.name,
        "version": env!("CARGO_PKG_VERSION"),
        "tracked_users": records.len(),
        "pending": pending,
        "done": records.len() - pending,
    }))
}
