//! Historical exchange-rate resolution.
//!
//! TCMB (the Turkish central bank) publishes a daily indicative rate
//! bulletin as XML at a date-encoded URL. The rate that applies to a
//! transaction is the **ForexBuying** rate published the business day
//! before the transaction date, so the resolver starts one day back and
//! walks further back across weekends and holidays.
//!
//! [`RateSource`] is the seam the reconciliation engine depends on (it
//! lives in core so offline runs avoid the HTTP stack); [`TcmbRates`] is
//! the production implementation.

use chrono::{Days, NaiveDate};
use quick_xml::Reader;
use quick_xml::events::Event;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::core::{MutabakatError, parse_decimal};

pub use crate::core::{FixedRates, RateSource, ResolvedRate};

/// Maximum number of publication days searched backwards from the day
/// before the transaction date. Covers long holiday bridges.
const MAX_LOOKBACK_DAYS: u64 = 5;

/// Live TCMB bulletin client with a per-day response cache.
pub struct TcmbRates {
    client: reqwest::blocking::Client,
    base_url: String,
    /// Bulletin per publication date; `None` marks a day with no bulletin
    /// (weekend or holiday) so it is not re-fetched.
    cache: Mutex<HashMap<NaiveDate, Option<HashMap<String, Decimal>>>>,
}

impl Default for TcmbRates {
    fn default() -> Self {
        Self::new()
    }
}

impl TcmbRates {
    pub fn new() -> Self {
        Self::with_base_url("https://www.tcmb.gov.tr/kurlar")
    }

    /// Point the client at a different host (test servers).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            base_url: base_url.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn bulletin_url(&self, date: NaiveDate) -> String {
        format!(
            "{}/{}/{}.xml",
            self.base_url,
            date.format("%Y%m"),
            date.format("%d%m%Y")
        )
    }

    /// Fetch and parse one day's bulletin. `Ok(None)` for days without a
    /// bulletin; transport failures also resolve to `None` after a warning
    /// so one bad day cannot abort a batch.
    fn fetch_day(&self, date: NaiveDate) -> Option<HashMap<String, Decimal>> {
        let url = self.bulletin_url(date);
        let response = match self.client.get(&url).send() {
            Ok(r) => r,
            Err(e) => {
                warn!(%url, error = %e, "rate bulletin fetch failed");
                return None;
            }
        };
        if !response.status().is_success() {
            debug!(%url, status = %response.status(), "no bulletin for day");
            return None;
        }
        let body = match response.text() {
            Ok(b) => b,
            Err(e) => {
                warn!(%url, error = %e, "rate bulletin body unreadable");
                return None;
            }
        };
        match parse_bulletin(&body) {
            Ok(table) => Some(table),
            Err(e) => {
                warn!(%url, error = %e, "rate bulletin parse failed");
                None
            }
        }
    }
}

impl RateSource for TcmbRates {
    fn rate_for(
        &self,
        date: NaiveDate,
        currency: &str,
    ) -> Result<Option<ResolvedRate>, MutabakatError> {
        let currency = currency.to_ascii_uppercase();
        let Some(start) = date.checked_sub_days(Days::new(1)) else {
            return Ok(None);
        };

        for back in 0..MAX_LOOKBACK_DAYS {
            let Some(day) = start.checked_sub_days(Days::new(back)) else {
                break;
            };
            let mut cache = self
                .cache
                .lock()
                .map_err(|_| MutabakatError::Rate("rate cache poisoned".into()))?;
            let table = cache.entry(day).or_insert_with(|| self.fetch_day(day));
            if let Some(rate) = table.as_ref().and_then(|t| t.get(&currency)).copied() {
                debug!(%currency, %day, %rate, "rate resolved");
                return Ok(Some(ResolvedRate {
                    rate,
                    effective_date: day,
                }));
            }
        }
        warn!(%currency, %date, "no rate within lookback window");
        Ok(None)
    }
}

/// Parse a TCMB daily bulletin into a currency-code to ForexBuying table.
/// Currencies without a ForexBuying value (some bulletin rows carry only
/// cross rates) are omitted.
fn parse_bulletin(xml: &str) -> Result<HashMap<String, Decimal>, MutabakatError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut table = HashMap::new();
    let mut current_code: Option<String> = None;
    let mut in_forex_buying = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"Currency" => {
                    current_code = e.attributes().flatten().find_map(|a| {
                        (a.key.as_ref() == b"CurrencyCode")
                            .then(|| String::from_utf8_lossy(&a.value).into_owned())
                    });
                }
                b"ForexBuying" => in_forex_buying = true,
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_forex_buying => {
                if let Some(code) = &current_code {
                    let text = e.unescape().unwrap_or_default();
                    let rate = parse_decimal(text.trim());
                    if rate > Decimal::ZERO {
                        table.insert(code.clone(), rate);
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"ForexBuying" => in_forex_buying = false,
                b"Currency" => current_code = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(MutabakatError::Rate(format!("bulletin parse error: {e}"))),
            _ => {}
        }
    }
    Ok(table)
}
