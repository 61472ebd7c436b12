//! API error types with HTTP response mapping.
//!
//! Every error body is `{"message": ...}`. Internal causes are logged and
//! replaced by a generic message.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use document_store::DocumentStoreError;
use domain::DomainError;
use payments::PaymentError;
use serde::de::DeserializeOwned;

const INTERNAL_MESSAGE: &str = "Internal server error";
const CONFLICT_MESSAGE: &str = "The resource was modified concurrently, please retry";

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Missing or invalid credentials.
    Unauthorized,
    /// Domain logic error.
    Domain(DomainError),
    /// Payment settlement error.
    Payment(PaymentError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Authentication required".to_string(),
            ),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Payment(err) => payment_error_to_response(err),
            ApiError::Internal(msg) => internal(&msg),
        };

        let body = serde_json::json!({ "message": message });
        (status, Json(body)).into_response()
    }
}

fn internal(cause: &dyn std::fmt::Display) -> (StatusCode, String) {
    tracing::error!(error = %cause, "internal server error");
    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
}

fn store_error_to_response(err: DocumentStoreError) -> (StatusCode, String) {
    if err.is_conflict() {
        tracing::warn!(error = %err, "conflict unresolved after retries");
        (StatusCode::CONFLICT, CONFLICT_MESSAGE.to_string())
    } else {
        internal(&err)
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match err {
        DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        DomainError::Forbidden(_) => (StatusCode::FORBIDDEN, err.to_string()),
        DomainError::Validation(_)
        | DomainError::CartEmpty
        | DomainError::InsufficientStock { .. }
        | DomainError::InvalidStatusTransition { .. }
        | DomainError::Money(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        DomainError::Store(e) => store_error_to_response(e),
        DomainError::Serialization(_) => internal(&err),
    }
}

fn payment_error_to_response(err: PaymentError) -> (StatusCode, String) {
    match err {
        PaymentError::NotFound { .. } | PaymentError::SimulationDisabled => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        PaymentError::Forbidden(_) => (StatusCode::FORBIDDEN, err.to_string()),
        PaymentError::Validation(_) | PaymentError::AlreadyPaid | PaymentError::NotPayable(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        PaymentError::InvalidSignature => {
            (StatusCode::BAD_REQUEST, "Invalid signature".to_string())
        }
        PaymentError::Gateway(_) | PaymentError::NotConfigured(_) => {
            tracing::error!(error = %err, "payment gateway failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Payment gateway error".to_string(),
            )
        }
        PaymentError::Domain(e) => domain_error_to_response(e),
        PaymentError::Store(e) => store_error_to_response(e),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError::Payment(err)
    }
}

impl From<common::IdParseError> for ApiError {
    fn from(err: common::IdParseError) -> Self {
        ApiError::BadRequest(format!("Invalid {} id", err.kind))
    }
}

/// JSON body extractor whose rejection is an [`ApiError`].
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e: JsonRejection| ApiError::BadRequest(e.body_text()))?;
        Ok(ApiJson(value))
    }
}
