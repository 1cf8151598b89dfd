//! HTTP surface of the gate.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum Router, TraceLayer, graceful shutdown)
//!     → admin handlers (bearer auth) or /health
//!     → response.rs (errors rendered as JSON with mapped status)
//! ```
//!
//! The admin API is advisory: it reports and resets state but never sits on
//! the admission path.

pub mod response;
pub mod server;

pub use response::error_response;
pub use server::{AdminServer, AppState};
