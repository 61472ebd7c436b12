//! Order administration endpoints. Admin only, except that an order's
//! owner may read it.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use document_store::DocumentStore;
use domain::OrderStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::parse_id;
use super::views::{Message, OrderMessage, OrderResponse};
use crate::auth::Authenticated;
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCountResponse {
    pub order_count: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalSalesResponse {
    #[serde(with = "rust_decimal::serde::float")]
    pub total_sales: Decimal,
}

/// GET /orders
#[tracing::instrument(skip_all)]
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.orders.list_orders(&caller).await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state, caller))]
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let details = state.orders.get_order(&caller, parse_id(&id)?).await?;
    Ok(Json(details.into()))
}

/// GET /orders/user/{userId}
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

/// PUT /orders/{id}
#[tracing::instrument(skip(state, caller, req))]
pub async fn update_status<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateStatusRequest>,
) -> Result<Json<OrderMessage>, ApiError> {
    let status = OrderStatus::parse(req.status.trim())
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown order status: {}", req.status)))?;

    let order = state
        .orders
        .update_status(&caller, parse_id(&id)?, status)
        .await?;
    Ok(Json(OrderMessage {
        message: "Order status updated",
        order: order.into(),
    }))
}

/// DELETE /orders/{id}
#[tracing::instrument(skip(state, caller))]
pub async fn delete<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Message>, ApiError> {
    state.orders.delete_order(&caller, parse_id(&id)?).await?;
    Ok(Json(Message {
        message: "Order deleted",
    }))
}

/// GET /orders/get/count
#[tracing::instrument(skip_all)]
pub async fn count<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
) -> Result<Json<OrderCountResponse>, ApiError> {
    let order_count = state.orders.count_orders(&caller).await?;
    Ok(Json(OrderCountResponse { order_count }))
}

/// GET /orders/get/totalsales
#[tracing::instrument(skip_all)]
pub async fn total_sales<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
) -> Result<Json<TotalSalesResponse>, ApiError> {
    let total = state.orders.total_sales(&caller).await?;
    Ok(Json(TotalSalesResponse {
        total_sales: total.to_decimal(),
    }))
}
