//! Payment error types.

use document_store::DocumentStoreError;
use domain::{DomainError, OrderStatus, Retryable};
use thiserror::Error;

/// Errors that can occur while creating or settling payments.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    /// The order has already been paid; nothing was changed.
    #[error("Order is already paid")]
    AlreadyPaid,

    /// The order is in a status that can no longer take a payment.
    #[error("Order cannot be paid while {0}")]
    NotPayable(OrderStatus),

    /// A payment or webhook signature did not match.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The payment provider failed or returned something unusable.
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("UPI payment simulation is disabled")]
    SimulationDisabled,

    #[error(transparent)]
    Domain(DomainError),

    #[error("Document store error: {0}")]
    Store(#[from] DocumentStoreError),
}

/// Lifts the caller-facing domain errors into their payment counterparts so
/// that both crates report them the same way.
impl From<DomainError> for PaymentError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { entity, id } => PaymentError::NotFound { entity, id },
            DomainError::Forbidden(reason) => PaymentError::Forbidden(reason),
            DomainError::Validation(reason) => PaymentError::Validation(reason),
            DomainError::Store(e) => PaymentError::Store(e),
            other => PaymentError::Domain(other),
        }
    }
}

impl Retryable for PaymentError {
    fn is_conflict(&self) -> bool {
        match self {
            PaymentError::Store(e) => e.is_conflict(),
            PaymentError::Domain(e) => e.is_conflict(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_not_found_keeps_entity() {
        let err: PaymentError = DomainError::NotFound {
            entity: "Order",
            id: "abc".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Order not found: abc");
        assert!(matches!(err, PaymentError::NotFound { entity: "Order", .. }));
    }

    #[test]
    fn store_conflicts_are_retryable() {
        let conflict = DocumentStoreError::ConcurrencyConflict {
            key: document_store::DocumentKey::new("orders", "o1"),
            expected: Some(document_store::Version::first()),
            actual: Some(document_store::Version::new(2)),
        };
        let err: PaymentError = DomainError::Store(conflict).into();
        assert!(err.is_conflict());
        assert!(!PaymentError::AlreadyPaid.is_conflict());
    }
}
