//! Products and their stock counters.

use chrono::{DateTime, Utc};
use common::ProductId;
use document_store::{DocumentStore, WriteBatch};
use serde::{Deserialize, Serialize};

use crate::access::Caller;
use crate::error::DomainError;
use crate::money::Money;
use crate::repository::{Record, RecordBatch, Repository, Versioned};
use crate::retry::{RetryPolicy, retry_on_conflict};

/// A sellable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    /// Units available; never negative.
    pub count_in_stock: u32,
    pub created_at: DateTime<Utc>,
}

impl Record for Product {
    const COLLECTION: &'static str = "products";
    const ENTITY: &'static str = "Product";

    fn document_id(&self) -> String {
        self.id.to_string()
    }
}

/// Fields for a new product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub price: Money,
    pub count_in_stock: u32,
}

/// Partial update of a product; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub price: Option<Money>,
    pub count_in_stock: Option<u32>,
}

/// Service for reading and administering the catalog.
#[derive(Clone)]
pub struct CatalogService<S> {
    repo: Repository<S>,
    retry: RetryPolicy,
}

impl<S: DocumentStore> CatalogService<S> {
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self {
            repo: Repository::new(store),
            retry,
        }
    }

    /// Creates a product. Admin only.
    #[tracing::instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create_product(
        &self,
        caller: &Caller,
        product: NewProduct,
    ) -> Result<Product, DomainError> {
        caller.ensure_admin()?;
        if product.name.trim().is_empty() {
            return Err(DomainError::Validation("product name is required".into()));
        }

        let product = Product {
            id: ProductId::new(),
            name: product.name,
            price: product.price,
            count_in_stock: product.count_in_stock,
            created_at: Utc::now(),
        };
        self.repo
            .commit(WriteBatch::new().insert_record(&product)?)
            .await?;

        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product, DomainError> {
        Ok(self.repo.require::<Product>(&id.to_string()).await?.record)
    }

    /// Updates name, price or stock. Admin only.
    ///
    /// Existing orders keep the total computed at checkout.
    #[tracing::instrument(skip(self, update))]
    pub async fn update_product(
        &self,
        caller: &Caller,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, DomainError> {
        caller.ensure_admin()?;
        if update.name.as_ref().is_some_and(|n| n.trim().is_empty()) {
            return Err(DomainError::Validation("product name is required".into()));
        }

        retry_on_conflict(&self.retry, "update_product", || async {
            let Versioned {
                record: mut product,
                version,
            } = self.repo.require::<Product>(&id.to_string()).await?;

            if let Some(name) = &update.name {
                product.name = name.clone();
            }
            if let Some(price) = update.price {
                product.price = price;
            }
            if let Some(count) = update.count_in_stock {
                product.count_in_stock = count;
            }

            self.repo
                .commit(WriteBatch::new().update_record(&product, version)?)
                .await?;
            Ok::<_, DomainError>(product)
        })
        .await
    }
}
