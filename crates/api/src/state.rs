//! Shared application state.

use std::sync::Arc;

use document_store::DocumentStore;
use domain::{CartService, CatalogService, CheckoutService, OrderService, RetryPolicy};
use payments::{PaymentGateway, SettlementConfig, SettlementEngine};

use crate::auth::Authenticator;

/// Services shared by all handlers.
pub struct AppState<S> {
    pub catalog: CatalogService<S>,
    pub carts: CartService<S>,
    pub checkout: CheckoutService<S>,
    pub orders: OrderService<S>,
    pub payments: SettlementEngine<S>,
    pub auth: Arc<dyn Authenticator>,
}

impl<S: DocumentStore + Clone + 'static> AppState<S> {
    /// Builds every service over the same store.
    pub fn new(
        store: S,
        auth: Arc<dyn Authenticator>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        settlement: SettlementConfig,
    ) -> Self {
        let retry: RetryPolicy = settlement.retry;
        Self {
            catalog: CatalogService::new(store.clone(), retry),
            carts: CartService::new(store.clone(), retry),
            checkout: CheckoutService::new(store.clone(), retry),
            orders: OrderService::new(store.clone(), retry),
            payments: SettlementEngine::new(store, gateway, settlement),
            auth,
        }
    }
}
