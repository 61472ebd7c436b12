//! Cart and direct-purchase checkout.
//!
//! Both paths run the same algorithm: read the products, check every line
//! against stock before writing anything, then commit the order lines, the
//! order, every stock decrement and (for cart checkout) the emptied cart as
//! one version-checked batch. A concurrent writer touching any of those
//! documents makes the batch fail as a whole; the attempt is then rerun
//! from fresh reads.

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use common::{OrderId, OrderLineId, ProductId, UserId};
use document_store::{DocumentStore, WriteBatch};

use super::{Order, OrderDetails, OrderLine, OrderStatus, ShippingInfo};
use crate::access::Caller;
use crate::cart::Cart;
use crate::catalog::Product;
use crate::error::DomainError;
use crate::money::Money;
use crate::repository::{RecordBatch, Repository, Versioned};
use crate::retry::{RetryPolicy, Retryable, retry_on_conflict};

/// Where the purchased lines come from.
#[derive(Debug, Clone, Copy)]
enum Source {
    Cart,
    Direct { product: ProductId, quantity: u32 },
}

impl Source {
    fn label(&self) -> &'static str {
        match self {
            Source::Cart => "cart",
            Source::Direct { .. } => "direct",
        }
    }
}

/// Turns carts and single-product requests into orders.
#[derive(Clone)]
pub struct CheckoutService<S> {
    repo: Repository<S>,
    retry: RetryPolicy,
}

impl<S: DocumentStore> CheckoutService<S> {
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self {
            repo: Repository::new(store),
            retry,
        }
    }

    /// Converts the user's cart into a pending order and empties the cart.
    #[tracing::instrument(skip(self, shipping))]
    pub async fn convert_cart_to_order(
        &self,
        caller: &Caller,
        user: UserId,
        shipping: ShippingInfo,
    ) -> Result<OrderDetails, DomainError> {
        caller.ensure_is(user)?;
        shipping.validate()?;
        self.checkout(user, Source::Cart, &shipping).await
    }

    /// Buys one product directly, leaving the cart alone.
    #[tracing::instrument(skip(self, shipping))]
    pub async fn direct_purchase(
        &self,
        caller: &Caller,
        user: UserId,
        product: ProductId,
        quantity: u32,
        shipping: ShippingInfo,
    ) -> Result<OrderDetails, DomainError> {
        caller.ensure_is(user)?;
        if quantity == 0 {
            return Err(DomainError::Validation(
                "quantity must be at least 1".to_string(),
            ));
        }
        shipping.validate()?;
        self.checkout(user, Source::Direct { product, quantity }, &shipping)
            .await
    }

    async fn checkout(
        &self,
        user: UserId,
        source: Source,
        shipping: &ShippingInfo,
    ) -> Result<OrderDetails, DomainError> {
        let started = Instant::now();

        let result = retry_on_conflict(&self.retry, "checkout", || async {
            let attempt = self.attempt(user, source, shipping).await;
            if attempt.as_ref().is_err_and(Retryable::is_conflict) {
                metrics::counter!("checkout_conflicts_total").increment(1);
            }
            attempt
        })
        .await;

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());

        match &result {
            Ok(details) => {
                metrics::counter!("orders_created_total", "source" => source.label()).increment(1);
                tracing::info!(
                    order_id = %details.order.id,
                    %user,
                    total = %details.order.total_price,
                    source = source.label(),
                    "order created"
                );
            }
            Err(err) => {
                metrics::counter!("checkout_rejected_total", "reason" => rejection_reason(err))
                    .increment(1);
                tracing::warn!(%user, source = source.label(), error = %err, "checkout rejected");
            }
        }

        result
    }

    /// One read-check-write pass. Fails with a conflict if anything it read
    /// changed before the commit.
    async fn attempt(
        &self,
        user: UserId,
        source: Source,
        shipping: &ShippingInfo,
    ) -> Result<OrderDetails, DomainError> {
        let (wanted, cart) = match source {
            Source::Cart => {
                let cart = self.repo.require::<Cart>(&user.to_string()).await?;
                if cart.record.is_empty() {
                    return Err(DomainError::CartEmpty);
                }
                let wanted = cart
                    .record
                    .cart_items
                    .iter()
                    .map(|line| (line.product, line.quantity))
                    .collect::<Vec<_>>();
                (wanted, Some(cart))
            }
            Source::Direct { product, quantity } => (vec![(product, quantity)], None),
        };

        let products = self.load_products(&wanted).await?;

        // All-or-nothing stock check before any write
        for (product_id, quantity) in &wanted {
            let product = &products[product_id].record;
            if product.count_in_stock < *quantity {
                return Err(DomainError::InsufficientStock {
                    product: *product_id,
                    requested: *quantity,
                    available: product.count_in_stock,
                });
            }
        }

        let lines = wanted
            .iter()
            .map(|(product_id, quantity)| OrderLine {
                id: OrderLineId::new(),
                product: *product_id,
                quantity: *quantity,
                unit_price: products[product_id].record.price,
            })
            .collect::<Vec<_>>();

        let total_price = Money::sum(
            lines
                .iter()
                .map(OrderLine::subtotal)
                .collect::<Result<Vec<_>, _>>()?,
        )?;

        let order = Order {
            id: OrderId::new(),
            order_items: lines.iter().map(|line| line.id).collect(),
            shipping: shipping.clone(),
            status: OrderStatus::Pending,
            total_price,
            user,
            date_order: Utc::now(),
            payment_details: None,
        };

        let mut batch = WriteBatch::new();
        for line in &lines {
            batch = batch.insert_record(line)?;
        }
        batch = batch.insert_record(&order)?;

        for (product_id, quantity) in &wanted {
            let Versioned { record, version } = &products[product_id];
            let mut product = record.clone();
            product.count_in_stock -= quantity;
            batch = batch.update_record(&product, *version)?;
        }

        if let Some(Versioned {
            record: mut cart,
            version,
        }) = cart
        {
            cart.empty();
            batch = batch.update_record(&cart, version)?;
        }

        self.repo.commit(batch).await?;

        Ok(OrderDetails { order, lines })
    }

    async fn load_products(
        &self,
        wanted: &[(ProductId, u32)],
    ) -> Result<HashMap<ProductId, Versioned<Product>>, DomainError> {
        let ids = wanted
            .iter()
            .map(|(id, _)| id.to_string())
            .collect::<Vec<_>>();
        let products = self
            .repo
            .load_many::<Product>(&ids)
            .await?
            .into_iter()
            .map(|p| (p.record.id, p))
            .collect::<HashMap<_, _>>();

        if let Some((missing, _)) = wanted.iter().find(|(id, _)| !products.contains_key(id)) {
            return Err(DomainError::not_found("Product", missing));
        }
        Ok(products)
    }
}

fn rejection_reason(err: &DomainError) -> &'static str {
    match err {
        DomainError::NotFound { .. } => "not_found",
        DomainError::CartEmpty => "cart_empty",
        DomainError::InsufficientStock { .. } => "insufficient_stock",
        DomainError::Validation(_) => "validation",
        DomainError::Forbidden(_) => "forbidden",
        e if e.is_conflict() => "conflict",
        _ => "internal",
    }
}
