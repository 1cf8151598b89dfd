//! Admission failure taxonomy.

use axum::http::StatusCode;
use thiserror::Error;

use crate::resilience::CircuitOpen;

/// Why an admission did not produce a result.
///
/// `E` is the protected operation's own error type, returned untouched in
/// [`GateError::OperationFailed`].
#[derive(Debug, Error)]
pub enum GateError<E> {
    /// Malformed input (e.g. negative cost). Nothing was charged.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The reservation pushed the tenant over its limit. The operation was
    /// not invoked.
    #[error("budget exceeded for tenant '{tenant}': {spend:.4} > {limit:.4}")]
    BudgetExceeded {
        tenant: String,
        spend: f64,
        limit: f64,
    },

    /// The spend store could not be reached. Admission fails closed.
    #[error("budget ledger unavailable: {reason}")]
    LedgerUnavailable { reason: String },

    /// The dependency's breaker is open. The reservation was rolled back.
    #[error(transparent)]
    BreakerOpen(CircuitOpen),

    /// The operation ran and failed. The reservation was rolled back.
    #[error("upstream operation failed: {0}")]
    OperationFailed(E),
}

impl<E> GateError<E> {
    /// Stable machine-readable name, used in logs, metrics and API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            GateError::InvalidRequest(_) => "invalid_request",
            GateError::BudgetExceeded { .. } => "budget_exceeded",
            GateError::LedgerUnavailable { .. } => "ledger_unavailable",
            GateError::BreakerOpen(_) => "breaker_open",
            GateError::OperationFailed(_) => "operation_failed",
        }
    }

    /// HTTP status an API layer should answer with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GateError::BudgetExceeded { .. } => StatusCode::PAYMENT_REQUIRED,
            GateError::LedgerUnavailable { .. } | GateError::BreakerOpen(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GateError::OperationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The operation's own error, if it ran and failed.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            GateError::OperationFailed(e) => Some(e),
            _ => None,
        }
    }
}
