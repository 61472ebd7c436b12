//! JSON response bodies.
//!
//! Money is stored in minor units; every amount here is rendered as a
//! decimal in major units.

use chrono::{DateTime, Utc};
use domain::{
    Address, CartItemView, CartLineUpdate, CartView, Order, OrderDetails, OrderLine, OrderStatus,
    PaymentDetails, PaymentStatus, Product, UpiApp,
};
use payments::PaymentStatusView;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub count_in_stock: u32,
    pub created_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name,
            price: product.price.to_decimal(),
            count_in_stock: product.count_in_stock,
            created_at: product.created_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemResponse {
    pub product: ProductResponse,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
}

impl From<CartItemView> for CartItemResponse {
    fn from(item: CartItemView) -> Self {
        Self {
            product: item.product.into(),
            quantity: item.quantity,
            subtotal: item.subtotal.to_decimal(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    /// Absent until the first item is added.
    pub id: Option<String>,
    pub user: String,
    pub cart_items: Vec<CartItemResponse>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
}

impl From<CartView> for CartResponse {
    fn from(cart: CartView) -> Self {
        Self {
            id: cart.id.map(|id| id.to_string()),
            user: cart.user.to_string(),
            cart_items: cart.items.into_iter().map(Into::into).collect(),
            total_amount: cart.total_amount.to_decimal(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineUpdateResponse {
    pub cart_id: String,
    pub product_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub quantity: u32,
}

impl From<CartLineUpdate> for CartLineUpdateResponse {
    fn from(update: CartLineUpdate) -> Self {
        Self {
            cart_id: update.cart_id.to_string(),
            product_id: update.product_id.to_string(),
            total_amount: update.total_amount.to_decimal(),
            quantity: update.quantity,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetailsResponse {
    pub transaction_id: String,
    pub payment_status: PaymentStatus,
    pub payment_date: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upi_app: Option<UpiApp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upi_id: Option<String>,
}

impl From<PaymentDetails> for PaymentDetailsResponse {
    fn from(details: PaymentDetails) -> Self {
        let (upi_app, upi_id) = match details.upi_details {
            Some(upi) => (Some(upi.app), Some(upi.upi_id)),
            None => (None, None),
        };
        Self {
            transaction_id: details.transaction_id,
            payment_status: details.payment_status,
            payment_date: details.payment_date,
            amount: details.amount.to_decimal(),
            currency: details.currency,
            upi_app,
            upi_id,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineResponse {
    pub id: String,
    pub product: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
}

impl From<OrderLine> for OrderLineResponse {
    fn from(line: OrderLine) -> Self {
        Self {
            id: line.id.to_string(),
            product: line.product.to_string(),
            quantity: line.quantity,
            unit_price: line.unit_price.to_decimal(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: String,
    pub order_items: Vec<OrderLineResponse>,
    pub shipping_address: Address,
    pub phone: String,
    pub status: OrderStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub user: String,
    pub date_order: DateTime<Utc>,
    pub payment_details: Option<PaymentDetailsResponse>,
}

impl OrderResponse {
    fn build(order: Order, lines: Vec<OrderLine>) -> Self {
        Self {
            id: order.id.to_string(),
            order_items: lines.into_iter().map(Into::into).collect(),
            shipping_address: order.shipping.shipping_address,
            phone: order.shipping.phone,
            status: order.status,
            total_price: order.total_price.to_decimal(),
            user: order.user.to_string(),
            date_order: order.date_order,
            payment_details: order.payment_details.map(Into::into),
        }
    }
}

impl From<OrderDetails> for OrderResponse {
    fn from(details: OrderDetails) -> Self {
        Self::build(details.order, details.lines)
    }
}

/// An order without its lines resolved.
impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self::build(order, Vec::new())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResponse {
    pub order_id: String,
    pub status: OrderStatus,
    pub payment_details: Option<PaymentDetailsResponse>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub date_order: DateTime<Utc>,
}

impl From<PaymentStatusView> for PaymentStatusResponse {
    fn from(view: PaymentStatusView) -> Self {
        Self {
            order_id: view.order_id.to_string(),
            status: view.status,
            payment_details: view.payment_details.map(Into::into),
            total_amount: view.total_amount.to_decimal(),
            date_order: view.date_order,
        }
    }
}

/// `{"message": ..., "order": ...}` as returned by mutations.
#[derive(Serialize)]
pub struct OrderMessage {
    pub message: &'static str,
    pub order: OrderResponse,
}

#[derive(Serialize)]
pub struct Message {
    pub message: &'static str,
}
