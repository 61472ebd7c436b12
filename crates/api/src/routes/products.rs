//! Minimal catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use document_store::DocumentStore;
use domain::{Money, NewProduct, ProductUpdate};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::parse_id;
use super::views::ProductResponse;
use crate::auth::Authenticated;
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub count_in_stock: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    pub count_in_stock: Option<u32>,
}

fn money(amount: Decimal) -> Result<Money, ApiError> {
    Money::from_decimal(amount).map_err(|e| ApiError::BadRequest(format!("Invalid price: {e}")))
}

/// POST /products
#[tracing::instrument(skip(state, caller, req))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    ApiJson(req): ApiJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let product = state
        .catalog
        .create_product(
            &caller,
            NewProduct {
                name: req.name,
                price: money(req.price)?,
                count_in_stock: req.count_in_stock,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// GET /products/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state.catalog.get_product(parse_id(&id)?).await?;
    Ok(Json(product.into()))
}

/// PUT /products/{id}
#[tracing::instrument(skip(state, caller, req))]
pub async fn update<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let update = ProductUpdate {
        name: req.name,
        price: req.price.map(money).transpose()?,
        count_in_stock: req.count_in_stock,
    };
    let product = state
        .catalog
        .update_product(&caller, parse_id(&id)?, update)
        .await?;
    Ok(Json(product.into()))
}
