//! Per-user shopping carts.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{CartId, ProductId, UserId};
use document_store::{DocumentStore, WriteBatch};
use serde::{Deserialize, Serialize};

use crate::access::Caller;
use crate::catalog::Product;
use crate::error::DomainError;
use crate::money::Money;
use crate::repository::{Record, RecordBatch, Repository, Versioned};
use crate::retry::{RetryPolicy, retry_on_conflict};

/// One (product, quantity) line of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product: ProductId,
    pub quantity: u32,
}

/// A user's cart. Stored under the owning user's id, one per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: CartId,
    pub user: UserId,
    pub cart_items: Vec<CartLine>,
    /// Recomputed from current prices on every line change.
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(user: UserId) -> Self {
        Self {
            id: CartId::new(),
            user,
            cart_items: Vec::new(),
            total_amount: Money::ZERO,
            created_at: Utc::now(),
        }
    }

    pub fn line(&self, product: ProductId) -> Option<&CartLine> {
        self.cart_items.iter().find(|line| line.product == product)
    }

    pub fn is_empty(&self) -> bool {
        self.cart_items.is_empty()
    }

    /// Removes every line and resets the total.
    pub fn empty(&mut self) {
        self.cart_items.clear();
        self.total_amount = Money::ZERO;
    }

    pub fn product_ids(&self) -> Vec<String> {
        self.cart_items
            .iter()
            .map(|line| line.product.to_string())
            .collect()
    }
}

impl Record for Cart {
    const COLLECTION: &'static str = "carts";
    const ENTITY: &'static str = "Cart";

    fn document_id(&self) -> String {
        self.user.to_string()
    }
}

/// A cart line with its product resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItemView {
    pub product: Product,
    pub quantity: u32,
    pub subtotal: Money,
}

/// A cart as shown to its owner, with the total recomputed from current prices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartView {
    /// None when the user has never added anything.
    pub id: Option<CartId>,
    pub user: UserId,
    pub items: Vec<CartItemView>,
    pub total_amount: Money,
}

impl CartView {
    fn empty(user: UserId) -> Self {
        Self {
            id: None,
            user,
            items: Vec::new(),
            total_amount: Money::ZERO,
        }
    }
}

/// Result of changing one line's quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLineUpdate {
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub total_amount: Money,
}

/// Service for reading and editing carts.
///
/// Every operation is restricted to the cart's owner.
#[derive(Clone)]
pub struct CartService<S> {
    repo: Repository<S>,
    retry: RetryPolicy,
}

impl<S: DocumentStore> CartService<S> {
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self {
            repo: Repository::new(store),
            retry,
        }
    }

    /// Returns the user's cart, or an empty one if none exists yet.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, caller: &Caller, user: UserId) -> Result<CartView, DomainError> {
        caller.ensure_is(user)?;
        match self.repo.load::<Cart>(&user.to_string()).await? {
            Some(Versioned { record: cart, .. }) => self.view(&cart).await,
            None => Ok(CartView::empty(user)),
        }
    }

    /// Adds `quantity` units of a product, merging with an existing line.
    ///
    /// The merged quantity may not exceed the product's current stock.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        caller: &Caller,
        user: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartView, DomainError> {
        caller.ensure_is(user)?;
        require_positive(quantity)?;

        let cart = retry_on_conflict(&self.retry, "add_to_cart", || async {
            let product = self.repo.require::<Product>(&product_id.to_string()).await?;
            let existing = self.repo.load::<Cart>(&user.to_string()).await?;

            let (mut cart, version) = match existing {
                Some(Versioned { record, version }) => (record, Some(version)),
                None => (Cart::new(user), None),
            };

            let merged = cart
                .line(product_id)
                .map_or(quantity, |line| line.quantity.saturating_add(quantity));
            ensure_stock(&product.record, merged)?;

            match cart.cart_items.iter_mut().find(|l| l.product == product_id) {
                Some(line) => line.quantity = merged,
                None => cart.cart_items.push(CartLine {
                    product: product_id,
                    quantity: merged,
                }),
            }

            self.save(cart, version).await
        })
        .await?;

        self.view(&cart).await
    }

    /// Sets the quantity of a product already in the cart.
    #[tracing::instrument(skip(self))]
    pub async fn update_item(
        &self,
        caller: &Caller,
        user: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartLineUpdate, DomainError> {
        caller.ensure_is(user)?;
        require_positive(quantity)?;

        let cart = retry_on_conflict(&self.retry, "update_cart_item", || async {
            let Versioned {
                record: mut cart,
                version,
            } = self.repo.require::<Cart>(&user.to_string()).await?;

            let line = cart
                .cart_items
                .iter_mut()
                .find(|l| l.product == product_id)
                .ok_or_else(|| DomainError::not_found("Cart item", product_id))?;

            let product = self.repo.require::<Product>(&product_id.to_string()).await?;
            ensure_stock(&product.record, quantity)?;
            line.quantity = quantity;

            self.save(cart, Some(version)).await
        })
        .await?;

        Ok(CartLineUpdate {
            cart_id: cart.id,
            product_id,
            quantity,
            total_amount: cart.total_amount,
        })
    }

    /// Removes a product's line from the cart.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        caller: &Caller,
        user: UserId,
        product_id: ProductId,
    ) -> Result<CartView, DomainError> {
        caller.ensure_is(user)?;

        let cart = retry_on_conflict(&self.retry, "remove_cart_item", || async {
            let Versioned {
                record: mut cart,
                version,
            } = self.repo.require::<Cart>(&user.to_string()).await?;

            let before = cart.cart_items.len();
            cart.cart_items.retain(|l| l.product != product_id);
            if cart.cart_items.len() == before {
                return Err(DomainError::not_found("Cart item", product_id));
            }

            self.save(cart, Some(version)).await
        })
        .await?;

        self.view(&cart).await
    }

    /// Empties the cart, keeping the record.
    ///
    /// Returns false if the user has no cart; that is not an error.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, caller: &Caller, user: UserId) -> Result<bool, DomainError> {
        caller.ensure_is(user)?;

        retry_on_conflict(&self.retry, "clear_cart", || async {
            let Some(Versioned {
                record: mut cart,
                version,
            }) = self.repo.load::<Cart>(&user.to_string()).await?
            else {
                return Ok(false);
            };

            if !cart.is_empty() || !cart.total_amount.is_zero() {
                cart.empty();
                self.repo
                    .commit(WriteBatch::new().update_record(&cart, version)?)
                    .await?;
                tracing::info!(user_id = %user, "cart cleared");
            }
            Ok::<_, DomainError>(true)
        })
        .await
    }

    /// Recomputes the total from current prices and writes the cart.
    async fn save(
        &self,
        mut cart: Cart,
        version: Option<document_store::Version>,
    ) -> Result<Cart, DomainError> {
        let products = self.products_by_id(&cart).await?;
        cart.total_amount = total_of(&cart, &products)?;

        let batch = match version {
            Some(version) => WriteBatch::new().update_record(&cart, version)?,
            None => WriteBatch::new().insert_record(&cart)?,
        };
        self.repo.commit(batch).await?;
        Ok(cart)
    }

    async fn view(&self, cart: &Cart) -> Result<CartView, DomainError> {
        let products = self.products_by_id(cart).await?;

        let items = cart
            .cart_items
            .iter()
            .filter_map(|line| {
                products.get(&line.product).map(|product| {
                    Ok(CartItemView {
                        product: product.clone(),
                        quantity: line.quantity,
                        subtotal: product.price.times(line.quantity)?,
                    })
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        Ok(CartView {
            id: Some(cart.id),
            user: cart.user,
            total_amount: Money::sum(items.iter().map(|i| i.subtotal))?,
            items,
        })
    }

    async fn products_by_id(&self, cart: &Cart) -> Result<HashMap<ProductId, Product>, DomainError> {
        Ok(self
            .repo
            .load_many::<Product>(&cart.product_ids())
            .await?
            .into_iter()
            .map(|p| (p.record.id, p.record))
            .collect())
    }
}

/// Sums line totals at current prices. Lines whose product has been
/// deleted contribute nothing.
fn total_of(cart: &Cart, products: &HashMap<ProductId, Product>) -> Result<Money, DomainError> {
    let subtotals = cart
        .cart_items
        .iter()
        .filter_map(|line| products.get(&line.product).map(|p| p.price.times(line.quantity)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Money::sum(subtotals)?)
}

fn require_positive(quantity: u32) -> Result<(), DomainError> {
    if quantity == 0 {
        return Err(DomainError::Validation(
            "quantity must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn ensure_stock(product: &Product, requested: u32) -> Result<(), DomainError> {
    if product.count_in_stock < requested {
        return Err(DomainError::InsufficientStock {
            product: product.id,
            requested,
            available: product.count_in_stock,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogService, NewProduct, ProductUpdate};
    use document_store::InMemoryDocumentStore;

    struct Fixture {
        carts: CartService<InMemoryDocumentStore>,
        catalog: CatalogService<InMemoryDocumentStore>,
        admin: Caller,
    }

    fn fixture() -> Fixture {
        let store = InMemoryDocumentStore::new();
        Fixture {
            carts: CartService::new(store.clone(), RetryPolicy::default()),
            catalog: CatalogService::new(store, RetryPolicy::default()),
            admin: Caller::admin(UserId::new()),
        }
    }

    async fn product(f: &Fixture, price_minor: i64, stock: u32) -> Product {
        f.catalog
            .create_product(
                &f.admin,
                NewProduct {
                    name: "Widget".to_string(),
                    price: Money::from_minor(price_minor).unwrap(),
                    count_in_stock: stock,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn missing_cart_reads_as_empty() {
        let f = fixture();
        let user = UserId::new();
        let view = f.carts.get_cart(&Caller::user(user), user).await.unwrap();

        assert!(view.id.is_none());
        assert!(view.items.is_empty());
        assert_eq!(view.total_amount, Money::ZERO);
    }

    #[tokio::test]
    async fn adding_same_product_merges_quantities() {
        let f = fixture();
        let user = UserId::new();
        let caller = Caller::user(user);
        let widget = product(&f, 1000, 5).await;

        f.carts.add_item(&caller, user, widget.id, 2).await.unwrap();
        let view = f.carts.add_item(&caller, user, widget.id, 1).await.unwrap();

        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items[0].quantity, 3);
        assert_eq!(view.total_amount.minor(), 3000);
    }

    #[tokio::test]
    async fn merged_quantity_is_checked_against_stock() {
        let f = fixture();
        let user = UserId::new();
        let caller = Caller::user(user);
        let widget = product(&f, 1000, 3).await;

        f.carts.add_item(&caller, user, widget.id, 2).await.unwrap();
        let err = f.carts.add_item(&caller, user, widget.id, 2).await.unwrap_err();

        assert!(matches!(
            err,
            DomainError::InsufficientStock {
                requested: 4,
                available: 3,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn total_follows_current_prices() {
        let f = fixture();
        let user = UserId::new();
        let caller = Caller::user(user);
        let widget = product(&f, 1000, 10).await;
        f.carts.add_item(&caller, user, widget.id, 2).await.unwrap();

        f.catalog
            .update_product(
                &f.admin,
                widget.id,
                ProductUpdate {
                    price: Some(Money::from_minor(1500).unwrap()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let view = f.carts.get_cart(&caller, user).await.unwrap();
        assert_eq!(view.total_amount.minor(), 3000);
    }

    #[tokio::test]
    async fn update_and_remove_lines() {
        let f = fixture();
        let user = UserId::new();
        let caller = Caller::user(user);
        let a = product(&f, 1000, 10).await;
        let b = product(&f, 250, 10).await;
        f.carts.add_item(&caller, user, a.id, 1).await.unwrap();
        f.carts.add_item(&caller, user, b.id, 1).await.unwrap();

        let updated = f.carts.update_item(&caller, user, a.id, 4).await.unwrap();
        assert_eq!(updated.quantity, 4);
        assert_eq!(updated.total_amount.minor(), 4250);

        let view = f.carts.remove_item(&caller, user, b.id).await.unwrap();
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.total_amount.minor(), 4000);

        let err = f.carts.remove_item(&caller, user, b.id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected() {
        let f = fixture();
        let user = UserId::new();
        let widget = product(&f, 1000, 10).await;
        let err = f
            .carts
            .add_item(&Caller::user(user), user, widget.id, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn clear_empties_cart_and_tolerates_missing() {
        let f = fixture();
        let user = UserId::new();
        let caller = Caller::user(user);
        assert!(!f.carts.clear(&caller, user).await.unwrap());

        let widget = product(&f, 1000, 10).await;
        f.carts.add_item(&caller, user, widget.id, 2).await.unwrap();
        assert!(f.carts.clear(&caller, user).await.unwrap());

        let view = f.carts.get_cart(&caller, user).await.unwrap();
        assert!(view.id.is_some());
        assert!(view.items.is_empty());
        assert_eq!(view.total_amount, Money::ZERO);
    }

    #[tokio::test]
    async fn other_users_cart_is_forbidden_even_for_admin() {
        let f = fixture();
        let owner = UserId::new();
        let err = f.carts.get_cart(&f.admin, owner).await.unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }
}
