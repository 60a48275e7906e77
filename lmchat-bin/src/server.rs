//! HTTP surface for the chat UI: `/api/chat` streams NDJSON session events,
//! `/api/models` passes the server's model list through.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Json, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use futures_util::stream;
use lmchat_core::{
    error::RelayError,
    model::{ModelList, RelayRequest},
    relay::ChatRelay,
    settings::SettingsStore,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub relay: ChatRelay,
    pub settings: Arc<SettingsStore>,
}

pub struct ApiError {
    err: RelayError,
    /// Answer with the inference server's own status for `Upstream` errors.
    passthrough: bool,
}

impl ApiError {
    fn passthrough(err: RelayError) -> Self {
        Self {
            err,
            passthrough: true,
        }
    }

    fn status(&self) -> StatusCode {
        match &self.err {
            RelayError::Validation(_) => StatusCode::BAD_REQUEST,
            RelayError::Transport { .. } => StatusCode::BAD_GATEWAY,
            RelayError::Upstream { status, .. } if self.passthrough => {
                StatusCode::from_u16(*status)
                    .ok()
                    .filter(|s| s.is_client_error() || s.is_server_error())
                    .unwrap_or(StatusCode::BAD_GATEWAY)
            }
            RelayError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        Self {
            err,
            passthrough: false,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let summary = match &self.err {
            RelayError::Validation(_) => "invalid request",
            RelayError::Transport { .. } => {
                "failed to connect to inference server"
            }
            RelayError::Upstream { .. } => "inference server returned an error",
            _ => "internal error",
        };
        let status = self.status();
        let mut body = json!({ "error": summary, "details": self.err.to_string() });
        if let RelayError::Upstream { status, .. } = &self.err {
            body["upstreamStatus"] = json!(status);
        }
        warn!(kind = self.err.kind(), error = %self.err, "request failed");
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelsQuery {
    server_url: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/models", get(models))
        .route("/api/health", get(health))
        .with_state(state)
}

pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<RelayRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(mut req) = payload.map_err(|e| RelayError::Validation(e.body_text()))?;
    if req.server_url.trim().is_empty() {
        req.server_url = state.settings.server_url();
    }

    let session = state.relay.open(req).await?;
    // The task outlives the response body. Dropping the body closes the
    // receiver; the session then decodes to the end without emitting.
    let lines = stream::unfold(session.events, |mut rx| async move {
        let event = rx.recv().await?;
        Some((event.to_ndjson(), rx))
    });

    Ok((
        [
            (header::CONTENT_TYPE, "application/x-ndjson"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(lines),
    )
        .into_response())
}

async fn models(
    State(state): State<AppState>,
    Query(query): Query<ModelsQuery>,
) -> Result<Json<ModelList>, ApiError> {
    let server_url = query
        .server_url
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| state.settings.server_url());
    let list = state
        .relay
        .upstream(server_url.trim())
        .list_models()
        .await
        .map_err(ApiError::passthrough)?;
    Ok(Json(list))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "serverUrl": state.settings.server_url() }))
}
