//! Payment provider webhook events.
//!
//! Only the fields settlement needs are read; everything else in the
//! provider's payload is ignored.

use common::OrderId;
use serde::Deserialize;

use crate::error::PaymentError;

/// Event sent when a payment has been captured.
pub const PAYMENT_CAPTURED: &str = "payment.captured";

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPayload {
    pub payment: Option<PaymentWrapper>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentWrapper {
    pub entity: PaymentEntity,
}

/// A payment as reported by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    pub order_id: Option<String>,
    /// Minor units.
    pub amount: Option<i64>,
    pub currency: Option<String>,
    /// Free-form metadata set when the payment was opened. The provider
    /// sends an empty array instead of an empty object.
    #[serde(default)]
    pub notes: serde_json::Value,
}

impl PaymentEntity {
    /// The order id placed in the notes when the intent was created.
    pub fn noted_order(&self) -> Option<OrderId> {
        self.notes
            .get("orderId")
            .and_then(serde_json::Value::as_str)
            .and_then(|s| s.parse().ok())
    }
}

impl WebhookEvent {
    pub fn parse(body: &[u8]) -> Result<Self, PaymentError> {
        serde_json::from_slice(body)
            .map_err(|e| PaymentError::Validation(format!("Malformed webhook payload: {e}")))
    }

    /// The captured payment, if this is a capture event carrying one.
    pub fn captured_payment(&self) -> Option<&PaymentEntity> {
        if self.event != PAYMENT_CAPTURED {
            return None;
        }
        self.payload.payment.as_ref().map(|p| &p.entity)
    }
}
