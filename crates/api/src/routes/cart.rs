//! Cart endpoints. Every route acts only on the caller's own cart.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{ProductId, UserId};
use document_store::DocumentStore;
use serde::Deserialize;

use super::parse_id;
use super::views::{CartLineUpdateResponse, CartResponse, Message};
use crate::auth::Authenticated;
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub user_id: String,
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveCartItemRequest {
    pub product_id: String,
}

/// POST /cart
#[tracing::instrument(skip_all, fields(caller = %caller.user_id))]
pub async fn add<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    ApiJson(req): ApiJson<AddToCartRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let user: UserId = parse_id(&req.user_id)?;
    let product: ProductId = parse_id(&req.product_id)?;

    let cart = state
        .carts
        .add_item(&caller, user, product, req.quantity)
        .await?;
    Ok(Json(cart.into()))
}

/// GET /cart/{userId}
#[tracing::instrument(skip(state, caller))]
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(user_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.carts.get_cart(&caller, parse_id(&user_id)?).await?;
    Ok(Json(cart.into()))
}

/// PUT /cart/{userId}
#[tracing::instrument(skip(state, caller, req))]
pub async fn update<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(user_id): Path<String>,
    ApiJson(req): ApiJson<UpdateCartItemRequest>,
) -> Result<Json<CartLineUpdateResponse>, ApiError> {
    let update = state
        .carts
        .update_item(
            &caller,
            parse_id(&user_id)?,
            parse_id(&req.product_id)?,
            req.quantity,
        )
        .await?;
    Ok(Json(update.into()))
}

/// DELETE /cart/{userId}
#[tracing::instrument(skip(state, caller, req))]
pub async fn remove<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(user_id): Path<String>,
    ApiJson(req): ApiJson<RemoveCartItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state
        .carts
        .remove_item(&caller, parse_id(&user_id)?, parse_id(&req.product_id)?)
        .await?;
    Ok(Json(cart.into()))
}

/// DELETE /cart/clear/{userId}
#[tracing::instrument(skip(state, caller))]
pub async fn clear<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(user_id): Path<String>,
) -> Result<Json<Message>, ApiError> {
    let cleared = state.carts.clear(&caller, parse_id(&user_id)?).await?;
    let message = if cleared {
        "Cart cleared"
    } else {
        "Cart is already empty"
    };
    Ok(Json(Message { message }))
}
