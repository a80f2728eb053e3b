use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::Json,
    routing::{get, post},
};
use insurance_flow::{Session, UserId};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::telegram::{Update, UpdateQueue};

pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";
const CORRELATION_ID_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct AppState {
    pub updates: UpdateQueue,
    pub webhook_secret: Option<String>,
}

/// Health and session inspection routes, plus the Telegram webhook when enabled.
pub fn build_router(app_state: AppState, webhook: bool) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/session/{user_id}", get(get_session));

    if webhook {
        router = router.route("/telegram/webhook", post(telegram_webhook));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(correlation_id_middleware))
        .with_state(app_state)
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let correlation_id = Uuid::new_v4().to_string();
    let header = HeaderValue::from_str(&correlation_id).ok();

    if let Some(value) = &header {
        request
            .headers_mut()
            .insert(CORRELATION_ID_HEADER, value.clone());
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    let mut response = next.run(request).instrument(span).await;

    if let Some(value) = header {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    response
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let sessions = state.updates.dispatcher().registry().store().len().await.ok();
    Json(json!({
        "status": "healthy",
        "sessions": sessions,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Session>, StatusCode> {
    let user_id = UserId::new(user_id);
    info!(user_id = %user_id, "Getting session");

    match state.updates.dispatcher().registry().store().get(&user_id).await {
        Ok(Some(session)) => Ok(Json(session)),
        Ok(None) => {
            info!(user_id = %user_id, "Session not found");
            Err(StatusCode::NOT_FOUND)
        }
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Failed to get session");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn telegram_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> StatusCode {
    if let Some(expected) = &state.webhook_secret {
        let provided = headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());
        if provided != Some(expected.as_str()) {
            warn!(update_id = update.update_id, "webhook call with a bad secret token");
            return StatusCode::UNAUTHORIZED;
        }
    }

    // Acknowledge right away; Telegram retries slow webhooks.
    state.updates.enqueue(update);
    StatusCode::OK
}
