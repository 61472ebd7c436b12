//! Order, order line and payment intent records.

use chrono::{DateTime, Utc};
use common::{OrderId, OrderLineId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use super::{OrderStatus, PaymentDetails, ShippingInfo};
use crate::error::DomainError;
use crate::money::Money;
use crate::repository::Record;

/// One purchased (product, quantity) pair. Never mutated after checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub id: OrderLineId,
    pub product: ProductId,
    pub quantity: u32,
    /// Product price read at checkout.
    pub unit_price: Money,
}

impl OrderLine {
    pub fn subtotal(&self) -> Result<Money, DomainError> {
        Ok(self.unit_price.times(self.quantity)?)
    }
}

impl Record for OrderLine {
    const COLLECTION: &'static str = "order_lines";
    const ENTITY: &'static str = "Order line";

    fn document_id(&self) -> String {
        self.id.to_string()
    }
}

/// A placed order.
///
/// `total_price` is fixed at checkout and never recomputed; later price
/// changes on the products do not touch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub order_items: Vec<OrderLineId>,
    #[serde(flatten)]
    pub shipping: ShippingInfo,
    pub status: OrderStatus,
    pub total_price: Money,
    pub user: UserId,
    /// Stored as integer microseconds so that newest-first sorting is numeric.
    #[serde(with = "chrono::serde::ts_microseconds")]
    pub date_order: DateTime<Utc>,
    #[serde(default)]
    pub payment_details: Option<PaymentDetails>,
}

impl Order {
    /// Marks the order paid with the given payment details.
    ///
    /// Fails unless the order is still pending.
    pub fn record_payment(&mut self, details: PaymentDetails) -> Result<(), DomainError> {
        if !self.status.is_payable() {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status,
                to: OrderStatus::Paid,
            });
        }
        self.status = OrderStatus::Paid;
        self.payment_details = Some(details);
        Ok(())
    }

    /// Applies an administrative status change.
    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn line_ids(&self) -> Vec<String> {
        self.order_items.iter().map(ToString::to_string).collect()
    }
}

impl Record for Order {
    const COLLECTION: &'static str = "orders";
    const ENTITY: &'static str = "Order";

    fn document_id(&self) -> String {
        self.id.to_string()
    }
}

/// An order together with its resolved lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDetails {
    pub order: Order,
    pub lines: Vec<OrderLine>,
}

/// Link from a payment gateway's order id back to our order.
///
/// Written when a gateway intent is created; the order itself is untouched
/// until payment is verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub gateway_order_id: String,
    pub order: OrderId,
    pub user: UserId,
    pub amount_minor: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl Record for PaymentIntent {
    const COLLECTION: &'static str = "payment_intents";
    const ENTITY: &'static str = "Payment intent";

    fn document_id(&self) -> String {
        self.gateway_order_id.clone()
    }
}
