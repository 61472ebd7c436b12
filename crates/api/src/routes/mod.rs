//! HTTP handlers, grouped by resource.

pub mod cart;
pub mod orders;
pub mod payments;
pub mod products;
pub mod purchase;
pub mod system;
pub mod views;

use std::str::FromStr;

use common::IdParseError;

use crate::error::ApiError;

/// Parses a path or body identifier, rejecting malformed ones with 400.
pub(crate) fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = IdParseError>,
{
    Ok(raw.parse()?)
}
