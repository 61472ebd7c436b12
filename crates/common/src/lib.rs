//! Shared identifier types for the commerce backend.

mod ids;

pub use ids::{CartId, IdParseError, OrderId, OrderLineId, ProductId, UserId};
