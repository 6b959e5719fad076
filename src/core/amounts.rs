//! Locale-tolerant amount and date parsing shared by all document parsers.
//!
//! Source documents mix decimal conventions: UBL-TR amounts use a period,
//! legacy Kebir exports use Turkish grouping ("1.234,56"), and some vendor
//! software emits plain commas. All parsers funnel through these helpers so
//! the tolerance is in one place.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::str::FromStr;

/// Parse an amount as written in XML sources. Accepts "1234.56" and
/// "1234,56". Unparseable input maps to zero — per-field garbage must not
/// fail a whole document.
pub fn parse_decimal(text: &str) -> Decimal {
    let t = text.trim();
    if t.is_empty() {
        return Decimal::ZERO;
    }
    Decimal::from_str(t)
        .or_else(|_| Decimal::from_str(&t.replace(',', ".")))
        .unwrap_or(Decimal::ZERO)
}

/// Parse a Turkish-formatted amount ("1.234,56") from Kebir HTML cells.
pub fn parse_tr_amount(text: &str) -> Decimal {
    let t = text.trim().replace('.', "").replace(',', ".");
    if t.is_empty() {
        return Decimal::ZERO;
    }
    Decimal::from_str(&t).unwrap_or(Decimal::ZERO)
}

/// Parse a date in either ISO ("2025-10-05", optionally with a time suffix)
/// or Turkish ("05.10.2025") form.
pub fn parse_flex_date(text: &str) -> Option<NaiveDate> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    let day_part = t.split('T').next().unwrap_or(t);
    NaiveDate::parse_from_str(day_part, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(day_part, "%d.%m.%Y"))
        .ok()
}

/// Integer-truncated currency units, as used in the fallback match key.
pub fn trunc_units(amount: Decimal) -> i64 {
    amount.trunc().to_i64().unwrap_or(0)
}
