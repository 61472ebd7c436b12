//! Razorpay orders API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::PaymentError;
use crate::gateway::{GatewayIntent, IntentRequest, PaymentGateway};
use crate::signature;

pub const DEFAULT_BASE_URL: &str = "https://api.razorpay.com";

/// Upper bound on a whole gateway round trip.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Credentials and endpoint for the Razorpay API.
#[derive(Debug, Clone)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl RazorpayConfig {
    pub fn new(key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            key_secret: key_secret.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// [`PaymentGateway`] backed by Razorpay orders.
#[derive(Debug, Clone)]
pub struct RazorpayGateway {
    config: RazorpayConfig,
    http: Client,
}

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: String,
    notes: Notes,
    payment_capture: u8,
}

#[derive(Serialize)]
struct Notes {
    #[serde(rename = "orderId")]
    order_id: String,
    #[serde(rename = "userId")]
    user_id: String,
}

#[derive(Deserialize)]
struct CreateOrderResponse {
    id: String,
    amount: i64,
    currency: String,
}

impl RazorpayGateway {
    /// Builds the gateway and its HTTP client. Every request is bounded by
    /// `config.timeout`; a hung gateway surfaces as [`PaymentError::Gateway`].
    pub fn new(config: RazorpayConfig) -> Result<Self, PaymentError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Gateway(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn key_id(&self) -> &str {
        &self.config.key_id
    }

    #[tracing::instrument(skip(self, request), fields(order = %request.order))]
    async fn create_intent(&self, request: &IntentRequest) -> Result<GatewayIntent, PaymentError> {
        let url = format!("{}/v1/orders", self.config.base_url.trim_end_matches('/'));
        let body = CreateOrderRequest {
            amount: request.amount_minor,
            currency: &request.currency,
            receipt: request.order.to_string(),
            notes: Notes {
                order_id: request.order.to_string(),
                user_id: request.user.to_string(),
            },
            payment_capture: 1,
        };

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::Gateway(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PaymentError::Gateway(format!(
                "order creation failed with status {status}: {text}"
            )));
        }

        let created: CreateOrderResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Gateway(format!("unexpected response: {e}")))?;

        Ok(GatewayIntent {
            gateway_order_id: created.id,
            amount_minor: created.amount,
            currency: created.currency,
        })
    }

    fn verify_payment_signature(
        &self,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> bool {
        signature::verify(
            self.config.key_secret.as_bytes(),
            signature::payment_payload(gateway_order_id, payment_id).as_bytes(),
            signature,
        )
    }
}
