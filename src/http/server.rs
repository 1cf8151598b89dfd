//! Admin HTTP server setup.
//!
//! # Responsibilities
//! - Create the axum Router for the admin and health endpoints
//! - Wire up middleware (tracing, bearer auth)
//! - Serve until the shutdown broadcast fires

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::admin::{handlers, setup_admin_router};
use crate::config::AdminConfig;
use crate::gate::AdmissionGate;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AdmissionGate>,
    /// Swapped on config reload so a rotated API key applies immediately.
    pub admin: Arc<ArcSwap<AdminConfig>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(gate: Arc<AdmissionGate>, admin: AdminConfig) -> Self {
        Self {
            gate,
            admin: Arc::new(ArcSwap::from_pointee(admin)),
            started_at: Instant::now(),
        }
    }
}

/// HTTP server for the admin API.
pub struct AdminServer {
    router: Router,
}

impl AdminServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the axum router with all middleware layers.
    pub fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .with_state(state.clone())
            .merge(setup_admin_router(state))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Admin server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Admin server draining");
            })
            .await?;

        tracing::info!("Admin server stopped");
        Ok(())
    }
}
