//! Payment provider capability.

use async_trait::async_trait;
use common::{OrderId, UserId};

use crate::error::PaymentError;

/// What the provider needs to open a payment for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRequest {
    pub order: OrderId,
    pub user: UserId,
    /// Charge in the currency's minor unit (paise for INR).
    pub amount_minor: i64,
    pub currency: String,
}

/// A payment opened at the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayIntent {
    pub gateway_order_id: String,
    pub amount_minor: i64,
    pub currency: String,
}

/// A payment provider.
///
/// The settlement engine only needs to open payments and to check the
/// signature the provider hands the client after checkout; swapping the
/// provider never touches the order state machine.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key id the client uses to open the provider's checkout.
    fn key_id(&self) -> &str;

    /// Opens a payment at the provider. The order id must travel in the
    /// payment's metadata so that webhooks can find it again.
    async fn create_intent(&self, request: &IntentRequest) -> Result<GatewayIntent, PaymentError>;

    /// Checks the signature the provider issued for a completed checkout.
    fn verify_payment_signature(
        &self,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> bool;
}
