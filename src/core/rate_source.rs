//! The exchange-rate seam the reconciliation engine depends on.
//!
//! The production TCMB client lives behind the `rates` feature; the trait
//! and the in-memory [`FixedRates`] table stay in core so offline runs and
//! tests never pull in an HTTP stack.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::core::MutabakatError;

/// A rate successfully resolved for a transaction date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRate {
    pub rate: Decimal,
    /// Publication date of the bulletin the rate was taken from.
    pub effective_date: NaiveDate,
}

/// Source of local-currency conversion rates.
pub trait RateSource {
    /// Resolve the rate applying to a transaction on `date` in `currency`.
    ///
    /// `Ok(None)` means no rate could be found; the caller decides whether
    /// that is tolerable (it usually falls back to the nominal amount).
    fn rate_for(
        &self,
        date: NaiveDate,
        currency: &str,
    ) -> Result<Option<ResolvedRate>, MutabakatError>;
}

/// In-memory rate table keyed by transaction date. Unlike the TCMB client
/// there is no publication-day offset or walk-back; entries answer the
/// exact date they were registered for.
#[derive(Debug, Default)]
pub struct FixedRates {
    rates: HashMap<(NaiveDate, String), Decimal>,
}

impl FixedRates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, date: NaiveDate, currency: &str, rate: Decimal) -> Self {
        self.rates
            .insert((date, currency.to_ascii_uppercase()), rate);
        self
    }
}

impl RateSource for FixedRates {
    fn rate_for(
        &self,
        date: NaiveDate,
        currency: &str,
    ) -> Result<Option<ResolvedRate>, MutabakatError> {
        Ok(self
            .rates
            .get(&(date, currency.to_ascii_uppercase()))
            .map(|&rate| ResolvedRate {
                rate,
                effective_date: date,
            }))
    }
}
