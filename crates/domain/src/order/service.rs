//! Order queries and administration.

use common::{OrderId, UserId};
use document_store::{DocumentQuery, DocumentStore, WriteBatch};

use super::{Order, OrderDetails, OrderLine, OrderStatus};
use crate::access::Caller;
use crate::catalog::Product;
use crate::error::DomainError;
use crate::money::Money;
use crate::repository::{RecordBatch, Repository, Versioned};
use crate::retry::{RetryPolicy, retry_on_conflict};

/// Service for reading orders and applying administrative changes.
#[derive(Clone)]
pub struct OrderService<S> {
    repo: Repository<S>,
    retry: RetryPolicy,
}

impl<S: DocumentStore> OrderService<S> {
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self {
            repo: Repository::new(store),
            retry,
        }
    }

    /// Loads an order with its lines. Owner or admin.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(
        &self,
        caller: &Caller,
        order_id: OrderId,
    ) -> Result<OrderDetails, DomainError> {
        let order = self.repo.require::<Order>(&order_id.to_string()).await?.record;
        caller.ensure_owner_or_admin(order.user)?;
        self.with_lines(order).await
    }

    /// Lists a user's orders, newest first. Owner or admin.
    #[tracing::instrument(skip(self))]
    pub async fn list_user_orders(
        &self,
        caller: &Caller,
        user: UserId,
    ) -> Result<Vec<OrderDetails>, DomainError> {
        caller.ensure_owner_or_admin(user)?;
        let orders = self
            .repo
            .find::<Order>(
                DocumentQuery::default()
                    .filter("user", user.to_string())
                    .sort_desc("dateOrder"),
            )
            .await?;
        self.with_lines_all(orders).await
    }

    /// Lists every order, newest first. Admin only.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, caller: &Caller) -> Result<Vec<OrderDetails>, DomainError> {
        caller.ensure_admin()?;
        let orders = self
            .repo
            .find::<Order>(DocumentQuery::default().sort_desc("dateOrder"))
            .await?;
        self.with_lines_all(orders).await
    }

    /// Counts every order. Admin only.
    pub async fn count_orders(&self, caller: &Caller) -> Result<u64, DomainError> {
        caller.ensure_admin()?;
        self.repo.count::<Order>().await
    }

    /// Sums the frozen totals of every order whose payment has settled.
    /// Admin only.
    #[tracing::instrument(skip(self))]
    pub async fn total_sales(&self, caller: &Caller) -> Result<Money, DomainError> {
        caller.ensure_admin()?;

        let mut totals = Vec::new();
        for status in [OrderStatus::Paid, OrderStatus::Shipped, OrderStatus::Delivered] {
            let orders = self
                .repo
                .find::<Order>(DocumentQuery::default().filter("status", status.as_str()))
                .await?;
            totals.extend(orders.into_iter().map(|o| o.total_price));
        }
        Ok(Money::sum(totals)?)
    }

    /// Moves an order along the administrative edges of the status machine.
    ///
    /// Cancelling a pending order returns each line's quantity to stock in
    /// the same commit as the status change. Admin only.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        caller: &Caller,
        order_id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, DomainError> {
        caller.ensure_admin()?;

        let order = retry_on_conflict(&self.retry, "update_order_status", || async {
            let Versioned {
                record: mut order,
                version,
            } = self.repo.require::<Order>(&order_id.to_string()).await?;

            let previous = order.status;
            order.transition_to(next)?;

            let mut batch = WriteBatch::new().update_record(&order, version)?;
            if next == OrderStatus::Cancelled {
                batch = self.restock(batch, &order).await?;
            }
            self.repo.commit(batch).await?;

            tracing::info!(%order_id, from = %previous, to = %next, "order status changed");
            Ok::<_, DomainError>(order)
        })
        .await?;

        Ok(order)
    }

    /// Deletes an order and its lines. Admin only.
    ///
    /// Stock is not touched; cancel first to return it.
    #[tracing::instrument(skip(self))]
    pub async fn delete_order(&self, caller: &Caller, order_id: OrderId) -> Result<(), DomainError> {
        caller.ensure_admin()?;

        retry_on_conflict(&self.retry, "delete_order", || async {
            let Versioned { record: order, version } =
                self.repo.require::<Order>(&order_id.to_string()).await?;

            let mut batch = WriteBatch::new().delete_record::<Order>(&order.id.to_string(), version);
            for line in self.repo.load_many::<OrderLine>(&order.line_ids()).await? {
                batch = batch.delete_record::<OrderLine>(&line.record.id.to_string(), line.version);
            }
            self.repo.commit(batch).await?;

            tracing::info!(%order_id, "order deleted");
            Ok::<_, DomainError>(())
        })
        .await
    }

    /// Adds stock updates returning every line's quantity to its product.
    async fn restock(&self, mut batch: WriteBatch, order: &Order) -> Result<WriteBatch, DomainError> {
        let lines = self.repo.load_many::<OrderLine>(&order.line_ids()).await?;

        // A product can appear on several lines only if the order was
        // written by hand; fold them so each product is updated once.
        let mut returned: Vec<(String, u32)> = Vec::new();
        for line in lines {
            let id = line.record.product.to_string();
            match returned.iter_mut().find(|(p, _)| *p == id) {
                Some((_, quantity)) => *quantity += line.record.quantity,
                None => returned.push((id, line.record.quantity)),
            }
        }

        for (product_id, quantity) in returned {
            // Deleted products have nothing to restock
            if let Some(Versioned {
                record: mut product,
                version,
            }) = self.repo.load::<Product>(&product_id).await?
            {
                product.count_in_stock = product.count_in_stock.saturating_add(quantity);
                batch = batch.update_record(&product, version)?;
            }
        }
        Ok(batch)
    }

    async fn with_lines(&self, order: Order) -> Result<OrderDetails, DomainError> {
        let lines = self
            .repo
            .load_many::<OrderLine>(&order.line_ids())
            .await?
            .into_iter()
            .map(|line| line.record)
            .collect();
        Ok(OrderDetails { order, lines })
    }

    async fn with_lines_all(&self, orders: Vec<Order>) -> Result<Vec<OrderDetails>, DomainError> {
        let mut details = Vec::with_capacity(orders.len());
        for order in orders {
            details.push(self.with_lines(order).await?);
        }
        Ok(details)
    }
}
