//! HTTP transport (`server` feature).
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/generate` | Run a [`GenerationRequest`] through the pipeline |
//! | `GET`  | `/health` | Liveness check |
//!
//! Both routes require the `X-API-Key` header, checked before the body is
//! read. Failures are rendered as `{"status", "code", "detail"}` with the HTTP
//! status of the outcome class; a body that does not decode is a `400`
//! `bad_request`.

use crate::error::Error;
use crate::orchestrator::RequestOrchestrator;
use crate::types::GenerationRequest;
use crate::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<RequestOrchestrator>,
}

/// Build the axum router.
pub fn router(orchestrator: Arc<RequestOrchestrator>) -> Router {
    Router::new()
        .route("/generate", post(generate))
        .route("/health", get(health))
        .with_state(AppState { orchestrator })
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: &str, orchestrator: Arc<RequestOrchestrator>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "listening");
    axum::serve(listener, router(orchestrator)).await?;
    Ok(())
}

fn api_key(headers: &HeaderMap) -> Option<&str> {
    headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok())
}

fn error_body(code: StatusCode, label: &str, detail: String) -> Response {
    (
        code,
        Json(json!({
            "status": code.as_u16(),
            "code": label,
            "detail": detail,
        })),
    )
        .into_response()
}

async fn generate(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let credential = api_key(&headers);
    if let Err(e) = state.orchestrator.authenticate(credential) {
        return e.into_response();
    }
    let request: GenerationRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "undecodable generation request");
            return error_body(StatusCode::BAD_REQUEST, "bad_request", e.to_string());
        }
    };
    match state.orchestrator.handle(credential, &request).await {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn health(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match state.orchestrator.authenticate(api_key(&headers)) {
        Ok(_) => Json(json!({ "status": "healthy" })).into_response(),
        Err(e) => e.into_response(),
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let code =
            StatusCode::from_u16(status.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        // Rejected text is diagnostics only; the body carries the reason.
        let detail = match &self {
            Error::Auth(e) => e.to_string(),
            Error::Rejected { reason, .. } => reason.to_string(),
            Error::Generation(_) => "generation failed".to_string(),
            _ => "internal error".to_string(),
        };
        error_body(code, status.code(), detail)
    }
}
