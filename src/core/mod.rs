//! Core reconciliation types, account-chart configuration, and parsing
//! helpers.
//!
//! All monetary values are [`rust_decimal::Decimal`] — never floating point.

mod accounts;
mod amounts;
mod error;
mod rate_source;
mod types;

pub use accounts::*;
pub use amounts::*;
pub use error::*;
pub use rate_source::*;
pub use types::*;
