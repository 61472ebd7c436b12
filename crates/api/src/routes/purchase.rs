//! Checkout endpoints and the customer's view of their orders.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use document_store::DocumentStore;
use domain::ShippingInfo;
use serde::Deserialize;

use super::parse_id;
use super::views::{OrderMessage, OrderResponse};
use crate::auth::Authenticated;
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CartPurchaseRequest {
    #[serde(flatten)]
    pub shipping: ShippingInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectPurchaseRequest {
    pub product_id: String,
    pub quantity: u32,
    #[serde(flatten)]
    pub shipping: ShippingInfo,
}

/// POST /purchase/cart/{userId}
#[tracing::instrument(skip(state, caller, req))]
pub async fn from_cart<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(user_id): Path<String>,
    ApiJson(req): ApiJson<CartPurchaseRequest>,
) -> Result<(StatusCode, Json<OrderMessage>), ApiError> {
    let details = state
        .checkout
        .convert_cart_to_order(&caller, parse_id(&user_id)?, req.shipping)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderMessage {
            message: "Order created successfully",
            order: details.into(),
        }),
    ))
}

/// POST /purchase/direct/{userId}
#[tracing::instrument(skip(state, caller, req))]
pub async fn direct<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(user_id): Path<String>,
    ApiJson(req): ApiJson<DirectPurchaseRequest>,
) -> Result<(StatusCode, Json<OrderMessage>), ApiError> {
    let details = state
        .checkout
        .direct_purchase(
            &caller,
            parse_id(&user_id)?,
            parse_id(&req.product_id)?,
            req.quantity,
            req.shipping,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderMessage {
            message: "Order created successfully",
            order: details.into(),
        }),
    ))
}

/// GET /purchase/user/{userId}
#[tracing::instrument(skip(state, caller))]
pub async fn user_orders<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state
        .orders
        .list_user_orders(&caller, parse_id(&user_id)?)
        .await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// GET /purchase/{orderId}
#[tracing::instrument(skip(state, caller))]
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let details = state.orders.get_order(&caller, parse_id(&order_id)?).await?;
    Ok(Json(details.into()))
}
