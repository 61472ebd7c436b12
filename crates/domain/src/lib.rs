//! Commerce domain layer.
//!
//! This crate provides:
//! - Records stored in the document store (products, carts, orders, order
//!   lines, payment intents) and a typed repository over them
//! - `Money` in integer minor units
//! - The order status state machine
//! - Catalog, cart, checkout and order administration services, each
//!   committing multi-record changes as one version-checked batch with
//!   bounded retry

pub mod access;
pub mod cart;
pub mod catalog;
pub mod error;
pub mod money;
pub mod order;
pub mod repository;
pub mod retry;

pub use access::{Caller, Role};
pub use cart::{Cart, CartItemView, CartLine, CartLineUpdate, CartService, CartView};
pub use catalog::{CatalogService, NewProduct, Product, ProductUpdate};
pub use error::DomainError;
pub use money::{Money, MoneyError};
pub use order::{
    Address, CheckoutService, Order, OrderDetails, OrderLine, OrderService, OrderStatus,
    PaymentDetails, PaymentIntent, PaymentStatus, ShippingInfo, UpiApp, UpiDetails,
};
pub use repository::{Record, RecordBatch, Repository, Versioned};
pub use retry::{RetryPolicy, Retryable, retry_on_conflict};
