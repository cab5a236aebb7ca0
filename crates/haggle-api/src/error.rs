//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps negotiation and validation errors to HTTP status codes with a JSON
//! body carrying a machine-readable code, a message, and optional details.
//! Internal error details are logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use haggle_core::ValidationError;
use haggle_negotiation::NegotiationError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "ALREADY_ASSIGNED").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional context, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("{0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The negotiation state does not permit the action (409).
    ///
    /// Clients should refresh their snapshot rather than retry.
    #[error("{message}")]
    Conflict {
        /// One of `DELIVERY_CLOSED`, `ALREADY_ASSIGNED`, `INVALID_TRANSITION`,
        /// `INVALID_COUNTER_SEQUENCE`.
        code: &'static str,
        /// Human-readable message.
        message: String,
        /// Structured context for the client.
        details: Option<serde_json::Value>,
    },

    /// A dependency is not configured (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Conflict { code, .. } => (StatusCode::CONFLICT, *code),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::ServiceUnavailable(_) => tracing::warn!(error = %self, "service unavailable"),
            _ => {}
        }

        let details = match self {
            Self::Conflict { details, .. } => details,
            _ => None,
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<NegotiationError> for AppError {
    fn from(err: NegotiationError) -> Self {
        let message = err.to_string();
        let details = match &err {
            NegotiationError::DeliveryClosed {
                delivery_id,
                status,
            } => Some(serde_json::json!({
                "delivery_id": delivery_id,
                "status": status,
            })),
            NegotiationError::AlreadyAssigned { delivery_id } => Some(serde_json::json!({
                "delivery_id": delivery_id,
            })),
            NegotiationError::InvalidTransition {
                bid_id,
                from,
                action,
            } => Some(serde_json::json!({
                "bid_id": bid_id,
                "status": from,
                "action": action,
            })),
            NegotiationError::InvalidCounterSequence { bid_id, issuer } => {
                Some(serde_json::json!({
                    "bid_id": bid_id,
                    "last_counter_by": issuer,
                }))
            }
            NegotiationError::NotFound(_) => return Self::NotFound(message),
            NegotiationError::Store(_) => return Self::Internal(message),
        };
        Self::Conflict {
            code: err.code(),
            message,
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haggle_core::{BidId, DeliveryId};
    use haggle_negotiation::{Missing, StoreError};
    use haggle_state::{BidStatus, DeliveryStatus, Party};
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn not_found_status_code() {
        let err = AppError::from(NegotiationError::NotFound(Missing::Delivery(
            DeliveryId::new(),
        )));
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "NOT_FOUND");
    }

    #[test]
    fn negotiation_conflicts_keep_their_codes() {
        let d = DeliveryId::new();
        let b = BidId::new();
        let cases = [
            (
                NegotiationError::DeliveryClosed {
                    delivery_id: d,
                    status: DeliveryStatus::Expired,
                },
                "DELIVERY_CLOSED",
            ),
            (
                NegotiationError::AlreadyAssigned { delivery_id: d },
                "ALREADY_ASSIGNED",
            ),
            (
                NegotiationError::InvalidTransition {
                    bid_id: b,
                    from: BidStatus::Accepted,
                    action: "decline",
                },
                "INVALID_TRANSITION",
            ),
            (
                NegotiationError::InvalidCounterSequence {
                    bid_id: b,
                    issuer: Party::Courier,
                },
                "INVALID_COUNTER_SEQUENCE",
            ),
        ];
        for (err, expected) in cases {
            let (status, code) = AppError::from(err).status_and_code();
            assert_eq!(status, StatusCode::CONFLICT);
            assert_eq!(code, expected);
        }
    }

    #[test]
    fn validation_status_code() {
        let err = AppError::from(ValidationError::InvalidAmount(0));
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "VALIDATION_ERROR");
    }

    #[test]
    fn bad_request_status_code() {
        let err = AppError::BadRequest("malformed JSON".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "BAD_REQUEST");
    }

    #[test]
    fn store_faults_are_internal() {
        let err = AppError::from(NegotiationError::Store(StoreError::Duplicate(
            "bid x".into(),
        )));
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn internal_message_is_hidden() {
        let response = AppError::Internal("lock poisoned at shard 3".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(body["error"]["message"], "An internal error occurred");
        assert!(body["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn conflict_body_carries_details() {
        let d = DeliveryId::new();
        let response = AppError::from(NegotiationError::DeliveryClosed {
            delivery_id: d,
            status: DeliveryStatus::Cancelled,
        })
        .into_response();
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "DELIVERY_CLOSED");
        assert_eq!(body["error"]["details"]["status"], "cancelled");
        assert_eq!(body["error"]["details"]["delivery_id"], d.to_string());
    }
}
