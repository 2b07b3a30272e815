pub mod health;
pub mod metrics;
pub mod orders;
pub mod payments;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses a path segment into a typed id, rejecting malformed values with 400.
pub(crate) fn parse_id<T: FromStr>(raw: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid ID format: {raw}")))
}
