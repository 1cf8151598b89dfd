//! Admin API.
//!
//! # Endpoints
//! - `GET /admin/status`: version, uptime, store health, breaker counts
//! - `GET /admin/breakers`: every breaker's snapshot
//! - `POST /admin/breakers/{dependency}/reset`: close and clear history
//! - `POST /admin/breakers/{dependency}/open`: trip immediately
//! - `GET /admin/budget/{tenant}`: spend, limit and utilisation
//!
//! All routes require `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/breakers", get(list_breakers))
        .route("/admin/breakers/{dependency}/reset", post(reset_breaker))
        .route("/admin/breakers/{dependency}/open", post(open_breaker))
        .route("/admin/budget/{tenant}", get(get_budget))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}
