//! Error to HTTP response mapping.
//!
//! # Responsibilities
//! - Render admission failures as JSON `{ "error": kind, "message": .. }`
//! - Map each failure kind to its HTTP status
//! - Advertise `Retry-After` when a breaker is open

use std::fmt::Display;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::gate::GateError;

/// JSON error body shared by every endpoint.
pub fn error_response(status: StatusCode, kind: &str, message: impl Display) -> Response {
    (
        status,
        Json(json!({
            "error": kind,
            "message": message.to_string(),
        })),
    )
        .into_response()
}

impl<E: Display> IntoResponse for GateError<E> {
    fn into_response(self) -> Response {
        let retry_after = match &self {
            GateError::BreakerOpen(open) => Some(open.retry_after.as_secs_f64().ceil() as u64),
            _ => None,
        };

        let mut response = error_response(self.status_code(), self.kind(), &self);
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::CircuitOpen;
    use axum::body::to_bytes;
    use std::time::Duration;

    #[tokio::test]
    async fn test_budget_exceeded_body() {
        let err: GateError<String> = GateError::BudgetExceeded {
            tenant: "acme".into(),
            spend: 60.0,
            limit: 50.0,
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "budget_exceeded");
        assert!(json["message"].as_str().unwrap().contains("acme"));
    }

    #[tokio::test]
    async fn test_breaker_open_sets_retry_after() {
        let err: GateError<String> = GateError::BreakerOpen(CircuitOpen {
            dependency: "openai".into(),
            retry_after: Duration::from_millis(1_500),
        });
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");
    }
}
