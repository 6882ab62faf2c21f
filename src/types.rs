//! Re-exported types from external crates for convenience.
//!
//! These types are commonly used in this SDK and are re-exported here
//! so users don't need to add these dependencies to their `Cargo.toml`.

/// Date and time types for trade timestamps.
pub use chrono::{DateTime, Utc};
/// Arbitrary precision decimal type for prices, volumes, and amounts.
pub use rust_decimal::Decimal;
/// Macro for creating [`Decimal`] literals at compile time.
///
/// # Example
/// ```
/// use zaif_client_sdk::types::dec;
/// let price = dec!(1000000.5);
/// ```
pub use rust_decimal_macros::dec;
/// Cancellation scope accepted by [`crate::stream::Client::receive`].
pub use tokio_util::sync::CancellationToken;
