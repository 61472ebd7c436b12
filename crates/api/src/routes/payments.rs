//! UPI and payment gateway endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use document_store::DocumentStore;
use payments::{WebhookOutcome, supported_apps};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::parse_id;
use super::views::{OrderMessage, OrderResponse, PaymentDetailsResponse, PaymentStatusResponse};
use crate::auth::Authenticated;
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

/// Header carrying the webhook body's HMAC.
pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentResponse {
    pub key_id: String,
    pub gateway_order_id: String,
    /// Minor units, as the gateway expects.
    pub amount: i64,
    pub currency: String,
}

/// Field names follow the gateway's checkout callback. Everything is
/// optional here so that a missing field is reported as such.
#[derive(Deserialize)]
pub struct VerifyRequest {
    #[serde(alias = "orderId")]
    pub order_id: Option<String>,
    #[serde(alias = "razorpayOrderId")]
    pub razorpay_order_id: Option<String>,
    #[serde(alias = "razorpayPaymentId")]
    pub razorpay_payment_id: Option<String>,
    #[serde(alias = "razorpaySignature")]
    pub razorpay_signature: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessUpiRequest {
    pub upi_id: String,
    pub upi_app: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessUpiResponse {
    pub message: &'static str,
    pub transaction_id: String,
    pub order: OrderResponse,
}

#[derive(Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct UpiAppResponse {
    pub id: &'static str,
    pub name: &'static str,
}

#[derive(Serialize)]
pub struct SupportedAppsResponse {
    pub apps: Vec<UpiAppResponse>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHistoryEntry {
    pub order_id: String,
    pub status: domain::OrderStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub date_order: chrono::DateTime<chrono::Utc>,
    pub payment_details: Option<PaymentDetailsResponse>,
}

/// POST /upi-payments/gateway/create/{orderId}
#[tracing::instrument(skip(state, caller))]
pub async fn create_intent<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(order_id): Path<String>,
) -> Result<Json<IntentResponse>, ApiError> {
    let intent = state
        .payments
        .create_intent(&caller, parse_id(&order_id)?)
        .await?;
    Ok(Json(IntentResponse {
        key_id: intent.key_id,
        gateway_order_id: intent.gateway_order_id,
        amount: intent.amount_minor,
        currency: intent.currency,
    }))
}

/// POST /upi-payments/gateway/verify
#[tracing::instrument(skip_all, fields(caller = %caller.user_id))]
pub async fn verify<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    ApiJson(req): ApiJson<VerifyRequest>,
) -> Result<Json<OrderMessage>, ApiError> {
    let (Some(order_id), Some(gateway_order_id), Some(payment_id), Some(signature)) = (
        req.order_id,
        req.razorpay_order_id,
        req.razorpay_payment_id,
        req.razorpay_signature,
    ) else {
        return Err(ApiError::BadRequest(
            "Missing payment verification fields".to_string(),
        ));
    };

    let order = state
        .payments
        .verify_and_settle(
            &caller,
            parse_id(&order_id)?,
            &gateway_order_id,
            &payment_id,
            &signature,
        )
        .await?;
    Ok(Json(OrderMessage {
        message: "Payment verified successfully",
        order: order.into(),
    }))
}

/// POST /upi-payments/gateway/webhook
///
/// Unauthenticated; trust comes from the body signature alone.
#[tracing::instrument(skip_all)]
pub async fn webhook<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let outcome = state.payments.handle_webhook(&body, signature).await?;
    if let WebhookOutcome::Ignored(reason) = outcome {
        tracing::debug!(reason, "webhook acknowledged without action");
    }
    Ok(Json(WebhookAck { status: "ok" }))
}

/// GET /upi-payments/status/{orderId}
#[tracing::instrument(skip(state, caller))]
pub async fn status<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(order_id): Path<String>,
) -> Result<Json<PaymentStatusResponse>, ApiError> {
    let view = state
        .payments
        .payment_status(&caller, parse_id(&order_id)?)
        .await?;
    Ok(Json(view.into()))
}

/// GET /upi-payments/history/{userId}
#[tracing::instrument(skip(state, caller))]
pub async fn history<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<PaymentHistoryEntry>>, ApiError> {
    let orders = state
        .payments
        .payment_history(&caller, parse_id(&user_id)?)
        .await?;
    Ok(Json(
        orders
            .into_iter()
            .map(|order| PaymentHistoryEntry {
                order_id: order.id.to_string(),
                status: order.status,
                total_price: order.total_price.to_decimal(),
                date_order: order.date_order,
                payment_details: order.payment_details.map(Into::into),
            })
            .collect(),
    ))
}

/// GET /upi-payments/supported-apps
pub async fn apps() -> Json<SupportedAppsResponse> {
    Json(SupportedAppsResponse {
        apps: supported_apps()
            .iter()
            .map(|app| UpiAppResponse {
                id: app.id(),
                name: app.display_name(),
            })
            .collect(),
    })
}

/// POST /upi-payments/process/{orderId}
///
/// Simulated collection; 404 unless enabled.
#[tracing::instrument(skip(state, caller, req))]
pub async fn process<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(order_id): Path<String>,
    ApiJson(req): ApiJson<ProcessUpiRequest>,
) -> Result<Json<ProcessUpiResponse>, ApiError> {
    let order = state
        .payments
        .process_upi(&caller, parse_id(&order_id)?, &req.upi_id, &req.upi_app)
        .await?;
    let transaction_id = order
        .payment_details
        .as_ref()
        .map(|p| p.transaction_id.clone())
        .unwrap_or_default();

    Ok(Json(ProcessUpiResponse {
        message: "Payment processed successfully",
        transaction_id,
        order: order.into(),
    }))
}
