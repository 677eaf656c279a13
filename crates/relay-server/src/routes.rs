//! HTTP handlers.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use metrics_exporter_prometheus::PrometheusHandle;
use relay_auth::{Authenticator, LoginRequest};
use relay_core::RelayError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::websocket::manager::ConnectionManager;
use crate::websocket::session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Connection registry.
    pub manager: Arc<ConnectionManager>,
    /// Login policy.
    pub authenticator: Arc<dyn Authenticator>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Renders `/metrics`.
    pub metrics: PrometheusHandle,
    /// When the server started.
    pub start_time: Instant,
}

/// An HTTP error status with a short plain-text body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        let status = match err {
            RelayError::Unauthorized => StatusCode::UNAUTHORIZED,
            RelayError::BadPayload(_) | RelayError::InvalidEnvelope(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

/// Query string of `/ws`.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    otp: Option<String>,
}

/// Body of a successful `/login`.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    /// One-time credential for `/ws?otp=`.
    pub otp: String,
}

/// GET /ws?otp=<token>
///
/// Origin is checked before the credential so a foreign page cannot burn a
/// valid OTP.
pub async fn ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<WsParams>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok());
    if !state.config.origin_allowed(origin) {
        warn!(origin, "rejecting websocket from disallowed origin");
        return Err(ApiError::new(StatusCode::FORBIDDEN, "origin not allowed"));
    }

    state.manager.authorize(params.otp.as_deref()).inspect_err(|_| {
        debug!("rejecting websocket with invalid credential");
    })?;

    let upgrade =
        upgrade.map_err(|rejection| ApiError::new(rejection.status(), rejection.body_text()))?;
    let manager = Arc::clone(&state.manager);
    Ok(upgrade
        .max_message_size(state.config.connection.max_frame_size)
        .max_frame_size(state.config.connection.max_frame_size)
        .on_upgrade(move |socket| async move {
            let _ = session::admit(socket, manager);
        }))
}

/// POST /login
pub async fn login_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<LoginResponse>, ApiError> {
    let request: LoginRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("invalid login body: {e}")))?;

    let otp = state
        .manager
        .issue_credential(state.authenticator.as_ref(), &request)
        .inspect_err(|_| info!(username = %request.username, "login rejected"))?;
    Ok(Json(LoginResponse { otp: otp.key }))
}

/// GET /debug: number of registered connections.
pub async fn debug_handler(State(state): State<AppState>) -> String {
    state.manager.connection_count().to_string()
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.manager.connection_count(),
        state.manager.credentials().len(),
    ))
}

/// GET /metrics: Prometheus text exposition.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
