//! C5 — registration endpoint: `POST /api/v1/srs/register` (spec.md §4.4,
//! §6).
//!
//! Grounded on `synctv-stream::streaming::live_router`'s axum `Router` +
//! `State` + `Json` request/response shape, and
//! `synctv-api::http::build_cors_layer`'s permissive development-mode CORS
//! (`Any`/`Any`/`Any`), since the registration endpoint is always
//! permissive per spec.md §6.

use std::net::IpAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use streamproxy_core::descriptor::BackendDescriptor;
use streamproxy_core::error::Error;
use streamproxy_core::StateBackend;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct RegisterState {
    backend: Arc<dyn StateBackend>,
    proxy_pid: String,
    cancel: CancellationToken,
}

impl RegisterState {
    #[must_use]
    pub fn new(backend: Arc<dyn StateBackend>, proxy_pid: String, cancel: CancellationToken) -> Self {
        Self {
            backend,
            proxy_pid,
            cancel,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub device_id: Option<String>,
    pub ip: IpAddr,
    pub server: String,
    pub service: String,
    pub pid: String,
    pub rtmp: Vec<String>,
    #[serde(default)]
    pub http: Vec<String>,
    #[serde(default)]
    pub api: Vec<String>,
    #[serde(default)]
    pub srt: Vec<String>,
    #[serde(default)]
    pub rtc: Vec<String>,
}

#[derive(Serialize)]
struct RegisterResponse {
    code: i32,
    pid: String,
}

/// Build the registration sub-router, mounted under `/api/v1/srs/register`
/// by the composition root.
pub fn router(state: RegisterState) -> Router {
    Router::new()
        .route("/api/v1/srs/register", post(handle_register))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}

async fn handle_register(State(state): State<RegisterState>, Json(req): Json<RegisterRequest>) -> Response {
    let descriptor = BackendDescriptor {
        server_id: req.server,
        service_id: req.service,
        pid: req.pid,
        ip: req.ip,
        rtmp: req.rtmp,
        http: req.http,
        api: req.api,
        srt: req.srt,
        rtc: req.rtc,
        device_id: req.device_id,
        updated_at: chrono::Utc::now(),
    };

    if let Err(err) = descriptor.validate() {
        warn!(error = %err, "rejecting invalid registration payload");
        return (StatusCode::BAD_GATEWAY, err.to_string()).into_response();
    }

    match state.backend.update(descriptor.clone(), &state.cancel).await {
        Ok(()) => {
            info!(server_id = %descriptor.server_id, service_id = %descriptor.service_id, "backend registered");
            Json(RegisterResponse {
                code: 0,
                pid: state.proxy_pid.clone(),
            })
            .into_response()
        }
        Err(Error::Cancelled) => (StatusCode::SERVICE_UNAVAILABLE, "proxy is shutting down".to_string()).into_response(),
        Err(err) => {
            warn!(error = %err, "registration failed to persist");
            (StatusCode::BAD_GATEWAY, err.to_string()).into_response()
        }
    }
}
