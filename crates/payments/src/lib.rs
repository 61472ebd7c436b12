//! Order payment settlement.
//!
//! This crate provides:
//! - The [`PaymentGateway`] capability with a Razorpay HTTP client and an
//!   in-memory implementation for tests
//! - HMAC-SHA256 signature checks for payment callbacks and webhooks
//! - The [`SettlementEngine`], which moves an order from pending to paid
//!   exactly once, whichever of the verify call, the webhook or the
//!   simulated UPI collection arrives first

pub mod error;
pub mod gateway;
pub mod memory;
pub mod razorpay;
pub mod settlement;
pub mod signature;
pub mod webhook;

pub use error::PaymentError;
pub use gateway::{GatewayIntent, IntentRequest, PaymentGateway};
pub use memory::InMemoryPaymentGateway;
pub use razorpay::{RazorpayConfig, RazorpayGateway};
pub use settlement::{
    IntentCreated, PaymentStatusView, SettlementConfig, SettlementEngine, WebhookOutcome,
    supported_apps,
};
pub use webhook::{PAYMENT_CAPTURED, PaymentEntity, WebhookEvent};
