//! Domain error types.

use common::ProductId;
use document_store::DocumentStoreError;
use thiserror::Error;

use crate::money::MoneyError;
use crate::order::OrderStatus;
use crate::retry::Retryable;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The request is malformed or breaks an input rule.
    #[error("{0}")]
    Validation(String),

    /// The caller may not act on this record.
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Checkout was attempted on a cart with no lines.
    #[error("Cart is empty")]
    CartEmpty,

    /// Not enough units of a product are in stock.
    #[error("Not enough stock for product {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: ProductId,
        requested: u32,
        available: u32,
    },

    /// The order cannot move between these two statuses.
    #[error("Cannot change order status from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("Invalid amount: {0}")]
    Money(#[from] MoneyError),

    /// An error occurred in the document store.
    #[error("Document store error: {0}")]
    Store(#[from] DocumentStoreError),

    /// A stored document could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl Retryable for DomainError {
    fn is_conflict(&self) -> bool {
        matches!(self, DomainError::Store(e) if e.is_conflict())
    }
}
