use axum::extract::State;
use axum::{Json, Router, routing::get};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub tools: usize,
    pub security: SecuritySummary,
}

/// Which gate stages are active, without revealing their values.
#[derive(Debug, Serialize, ToSchema)]
pub struct SecuritySummary {
    pub authentication_required: bool,
    pub shared_secret_required: bool,
    pub ip_allowlist_active: bool,
    pub allowed_ip_entries: usize,
    pub max_requests_per_window: u32,
    pub window_seconds: i64,
}

/// Liveness plus a summary of the gateway's access-control settings
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Gateway is running", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let gate = &state.gate;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        tools: state.registry.len(),
        security: SecuritySummary {
            authentication_required: gate.authentication_required(),
            shared_secret_required: gate.secret_required(),
            ip_allowlist_active: gate.allow_list().is_active(),
            allowed_ip_entries: gate.allow_list().len(),
            max_requests_per_window: gate.limiter().max_requests(),
            window_seconds: gate.limiter().window().num_seconds(),
        },
    })
}
