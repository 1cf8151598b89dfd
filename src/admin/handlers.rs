//! Admin and health endpoint handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::http::{error_response, AppState};
use crate::resilience::{BreakerSnapshot, CircuitState};

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    /// `operational`, or `degraded` when the spend store is unreachable.
    pub status: &'static str,
    pub uptime_secs: u64,
    pub store_healthy: bool,
    pub breakers: usize,
    pub open_breakers: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let store_healthy = state.gate.ledger().health_check().await.is_ok();
    let snapshots = state.gate.breakers().snapshots();
    let open_breakers = snapshots
        .iter()
        .filter(|s| s.state == CircuitState::Open)
        .count();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if store_healthy {
            "operational"
        } else {
            "degraded"
        },
        uptime_secs: state.started_at.elapsed().as_secs(),
        store_healthy,
        breakers: snapshots.len(),
        open_breakers,
    })
}

pub async fn list_breakers(State(state): State<AppState>) -> Json<Vec<BreakerSnapshot>> {
    Json(state.gate.breakers().snapshots())
}

pub async fn reset_breaker(
    State(state): State<AppState>,
    Path(dependency): Path<String>,
) -> Response {
    let breakers = state.gate.breakers();
    if !breakers.reset(&dependency) {
        return error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no breaker for '{dependency}'"),
        );
    }

    tracing::info!(dependency = %dependency, "Breaker reset via admin API");
    match breakers.get(&dependency) {
        Some(breaker) => Json(breaker.snapshot()).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Trip a breaker by hand, creating it if the dependency has not been seen.
pub async fn open_breaker(
    State(state): State<AppState>,
    Path(dependency): Path<String>,
) -> Json<BreakerSnapshot> {
    let breaker = state.gate.breakers().get_or_create(&dependency);
    breaker.force_open();
    tracing::warn!(dependency = %dependency, "Breaker forced open via admin API");
    Json(breaker.snapshot())
}

pub async fn get_budget(State(state): State<AppState>, Path(tenant): Path<String>) -> Response {
    match state.gate.ledger().snapshot(&tenant).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, "ledger_unavailable", e),
    }
}

/// Liveness plus spend store reachability. Unauthenticated.
pub async fn health(State(state): State<AppState>) -> Response {
    match state.gate.ledger().health_check().await {
        Ok(()) => Json(json!({ "status": "ok" })).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            error_response(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", e)
        }
    }
}
