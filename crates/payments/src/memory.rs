//! In-memory payment gateway for tests and local runs.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;

use crate::error::PaymentError;
use crate::gateway::{GatewayIntent, IntentRequest, PaymentGateway};
use crate::signature;

/// A gateway that opens payments locally and signs with a known secret.
#[derive(Debug)]
pub struct InMemoryPaymentGateway {
    key_id: String,
    key_secret: String,
    failing: AtomicBool,
    created: AtomicU64,
}

impl InMemoryPaymentGateway {
    pub fn new(key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            key_secret: key_secret.into(),
            failing: AtomicBool::new(false),
            created: AtomicU64::new(0),
        }
    }

    /// Makes every following `create_intent` fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of payments opened so far.
    pub fn intents_created(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }

    /// Signs a completed checkout the way the provider would.
    pub fn sign_payment(&self, gateway_order_id: &str, payment_id: &str) -> String {
        signature::sign(
            self.key_secret.as_bytes(),
            signature::payment_payload(gateway_order_id, payment_id).as_bytes(),
        )
        .unwrap_or_default()
    }
}

impl Default for InMemoryPaymentGateway {
    fn default() -> Self {
        Self::new("test_key", "test_secret")
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn create_intent(&self, request: &IntentRequest) -> Result<GatewayIntent, PaymentError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PaymentError::Gateway("gateway unavailable".to_string()));
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(GatewayIntent {
            gateway_order_id: format!("order_mem_{n}_{}", request.order.as_uuid().simple()),
            amount_minor: request.amount_minor,
            currency: request.currency.clone(),
        })
    }

    fn verify_payment_signature(
        &self,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> bool {
        signature::verify(
            self.key_secret.as_bytes(),
            signature::payment_payload(gateway_order_id, payment_id).as_bytes(),
            signature,
        )
    }
}
