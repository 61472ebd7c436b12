//! HTTP API server for the commerce backend.
//!
//! Provides REST endpoints for carts, checkout, order administration and
//! payments, with structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use document_store::DocumentStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: DocumentStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    use routes::{cart, orders, payments, products, purchase, system};

    let metrics_router = Router::new()
        .route("/metrics", get(system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(system::health))
        // Cart
        .route("/cart", post(cart::add::<S>))
        .route(
            "/cart/{user_id}",
            get(cart::get::<S>)
                .put(cart::update::<S>)
                .delete(cart::remove::<S>),
        )
        .route("/cart/clear/{user_id}", delete(cart::clear::<S>))
        // Checkout
        .route("/purchase/cart/{user_id}", post(purchase::from_cart::<S>))
        .route("/purchase/direct/{user_id}", post(purchase::direct::<S>))
        .route("/purchase/user/{user_id}", get(purchase::user_orders::<S>))
        .route("/purchase/{order_id}", get(purchase::get::<S>))
        // Order administration
        .route("/orders", get(orders::list::<S>))
        .route("/orders/get/count", get(orders::count::<S>))
        .route("/orders/get/totalsales", get(orders::total_sales::<S>))
        .route("/orders/user/{user_id}", get(orders::user_orders::<S>))
        .route(
            "/orders/{id}",
            get(orders::get::<S>)
                .put(orders::update_status::<S>)
                .delete(orders::delete::<S>),
        )
        // Payments
        .route(
            "/upi-payments/gateway/create/{order_id}",
            post(payments::create_intent::<S>),
        )
        .route("/upi-payments/gateway/verify", post(payments::verify::<S>))
        .route("/upi-payments/gateway/webhook", post(payments::webhook::<S>))
        .route("/upi-payments/status/{order_id}", get(payments::status::<S>))
        .route("/upi-payments/history/{user_id}", get(payments::history::<S>))
        .route("/upi-payments/supported-apps", get(payments::apps))
        .route("/upi-payments/process/{order_id}", post(payments::process::<S>))
        // Catalog
        .route("/products", post(products::create::<S>))
        .route("/products/{id}", get(products::get::<S>).put(products::update::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
