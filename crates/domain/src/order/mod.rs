//! Orders: records, status machine, checkout and administration.

mod checkout;
mod record;
mod service;
mod state;
mod value_objects;

pub use checkout::CheckoutService;
pub use record::{Order, OrderDetails, OrderLine, PaymentIntent};
pub use service::OrderService;
pub use state::OrderStatus;
pub use value_objects::{Address, PaymentDetails, PaymentStatus, ShippingInfo, UpiApp, UpiDetails};
