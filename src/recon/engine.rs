//! The reconciliation engine: pairs invoices with posting groups, converts
//! foreign-currency figures, cross-checks VAT and classifies every document
//! on both sides.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::core::{
    AccountChart, Direction, Invoice, LedgerBook, MatchMethod, MutabakatError, PostingGroup,
    RateOrigin, RateSource, ReconRecord, ReconStatus, trunc_units,
};
use crate::recon::compliance;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct ReconOptions {
    /// Maximum absolute difference (in local currency) still treated as
    /// agreement, for both the amount and the VAT check. Covers rounding
    /// between invoicing software and accounting software.
    pub tolerance: Decimal,
    /// Unmatched posting groups below this amount are never reported as
    /// undocumented.
    pub materiality: Decimal,
    pub chart: AccountChart,
}

impl Default for ReconOptions {
    fn default() -> Self {
        Self {
            tolerance: dec!(2),
            materiality: dec!(2),
            chart: AccountChart::default(),
        }
    }
}

/// Per-status counters for one reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ReconSummary {
    pub invoices: usize,
    pub ledger_documents: usize,
    pub matched: usize,
    pub amount_mismatch: usize,
    pub vat_mismatch: usize,
    pub amount_and_vat_mismatch: usize,
    pub unrecorded: usize,
    pub undocumented: usize,
}

impl ReconSummary {
    fn count(&mut self, status: ReconStatus) {
        match status {
            ReconStatus::Matched => self.matched += 1,
            ReconStatus::AmountMismatch => self.amount_mismatch += 1,
            ReconStatus::VatMismatch => self.vat_mismatch += 1,
            ReconStatus::AmountAndVatMismatch => self.amount_and_vat_mismatch += 1,
            ReconStatus::Unrecorded => self.unrecorded += 1,
            ReconStatus::Undocumented => self.undocumented += 1,
        }
    }
}

/// The full result of one run: one record per invoice, plus one residual
/// record per undocumented posting group, in that order.
#[derive(Debug, Clone)]
pub struct ReconReport {
    pub records: Vec<ReconRecord>,
    pub summary: ReconSummary,
}

/// Reconcile a batch of invoices against a merged ledger.
pub fn reconcile(
    invoices: &[Invoice],
    ledger: &LedgerBook,
    rates: &dyn RateSource,
    options: &ReconOptions,
) -> Result<ReconReport, MutabakatError> {
    let owner = ledger.owner_tax_id.as_deref();
    let mut summary = ReconSummary {
        invoices: invoices.len(),
        ledger_documents: ledger.len(),
        ..ReconSummary::default()
    };
    let mut records = Vec::with_capacity(invoices.len());

    // Exact-number pairings claim their groups up front so a fallback
    // match for one invoice can never steal another invoice's document.
    let mut claimed: HashSet<String> = invoices
        .iter()
        .filter(|i| ledger.contains(&i.number))
        .map(|i| i.number.clone())
        .collect();

    // Fallback candidates per (date, truncated amount), first-seen order.
    let mut fallback: HashMap<String, Vec<String>> = HashMap::new();
    for group in ledger.groups() {
        if let Some(date) = group.date {
            fallback
                .entry(fallback_key(date, group.total_debit))
                .or_default()
                .push(group.document_number.clone());
        }
    }

    for invoice in invoices {
        let direction = Direction::infer(
            owner,
            invoice.supplier.tax_id.as_deref(),
            invoice.customer.tax_id.as_deref(),
        );
        let (rate, rate_origin) = resolve_rate(invoice, rates)?;
        let converted = (invoice.gross_amount * rate).round_dp(2);
        let invoice_vat = (invoice.vat_amount * rate).round_dp(2);

        let (group, method) = if ledger.contains(&invoice.number) {
            (ledger.get(&invoice.number), MatchMethod::ExactNumber)
        } else if let Some(doc) = invoice.issue_date.and_then(|date| {
            fallback
                .get(&fallback_key(date, converted))
                .and_then(|candidates| {
                    candidates.iter().find(|d| !claimed.contains(d.as_str()))
                })
                .cloned()
        }) {
            claimed.insert(doc.clone());
            debug!(invoice = %invoice.number, document = %doc, "fallback-key match");
            (ledger.get(&doc), MatchMethod::FallbackKey)
        } else {
            (None, MatchMethod::None)
        };

        let status;
        let record = match group {
            Some(group) => {
                let amount_diff = converted - group.total_debit;
                let vat_diff = invoice_vat - group.vat_total;
                let amount_ok = amount_diff.abs() <= options.tolerance;
                let vat_ok = vat_diff.abs() <= options.tolerance;
                status = match (amount_ok, vat_ok) {
                    (true, true) => ReconStatus::Matched,
                    (false, true) => ReconStatus::AmountMismatch,
                    (true, false) => ReconStatus::VatMismatch,
                    (false, false) => ReconStatus::AmountAndVatMismatch,
                };
                let notes =
                    compliance::compliance_notes(direction, invoice_vat, group, &options.chart);
                ReconRecord {
                    invoice_number: invoice.number.clone(),
                    date: invoice.issue_date,
                    direction,
                    currency: invoice.currency_code.clone(),
                    original_amount: invoice.gross_amount,
                    rate,
                    rate_origin,
                    converted_amount: converted,
                    ledger_amount: group.total_debit,
                    amount_diff,
                    invoice_vat,
                    ledger_vat: group.vat_total,
                    vat_diff,
                    status,
                    match_method: method,
                    matched_document: Some(group.document_number.clone()),
                    compliance_notes: notes.join("; "),
                    source_file: invoice.source_file.clone(),
                    matched_lines_json: lines_json(group),
                }
            }
            None => {
                status = ReconStatus::Unrecorded;
                ReconRecord {
                    invoice_number: invoice.number.clone(),
                    date: invoice.issue_date,
                    direction,
                    currency: invoice.currency_code.clone(),
                    original_amount: invoice.gross_amount,
                    rate,
                    rate_origin,
                    converted_amount: converted,
                    ledger_amount: Decimal::ZERO,
                    amount_diff: Decimal::ZERO,
                    invoice_vat,
                    ledger_vat: Decimal::ZERO,
                    // With no booking, the whole invoice VAT is outstanding.
                    vat_diff: invoice_vat,
                    status,
                    match_method: MatchMethod::None,
                    matched_document: None,
                    compliance_notes: String::new(),
                    source_file: invoice.source_file.clone(),
                    matched_lines_json: "[]".into(),
                }
            }
        };
        summary.count(status);
        records.push(record);
    }

    // Residual pass: posting groups no invoice claimed.
    for group in ledger.groups() {
        if claimed.contains(&group.document_number) {
            continue;
        }
        if !compliance::looks_undocumented(group, &options.chart, options.materiality) {
            continue;
        }
        summary.count(ReconStatus::Undocumented);
        records.push(ReconRecord {
            invoice_number: group.document_number.clone(),
            date: group.date,
            direction: Direction::Unknown,
            currency: "TRY".into(),
            original_amount: group.total_debit,
            rate: Decimal::ONE,
            rate_origin: RateOrigin::SameCurrency,
            converted_amount: group.total_debit,
            ledger_amount: group.total_debit,
            // No invoice side, so the ledger figure is pure surplus.
            amount_diff: -group.total_debit,
            invoice_vat: Decimal::ZERO,
            ledger_vat: group.vat_total,
            vat_diff: Decimal::ZERO,
            status: ReconStatus::Undocumented,
            match_method: MatchMethod::None,
            matched_document: Some(group.document_number.clone()),
            compliance_notes: group.description.clone(),
            source_file: "ledger".into(),
            matched_lines_json: lines_json(group),
        });
    }

    info!(
        invoices = summary.invoices,
        matched = summary.matched,
        unrecorded = summary.unrecorded,
        undocumented = summary.undocumented,
        "reconciliation finished"
    );
    Ok(ReconReport { records, summary })
}

/// Composite key for number-less matching: same day, same whole-lira amount.
fn fallback_key(date: chrono::NaiveDate, amount: Decimal) -> String {
    format!("{}|{}", date.format("%Y-%m-%d"), trunc_units(amount))
}

/// Rate precedence: local currency, then the rate embedded in the document,
/// then the historical bulletin. With nothing resolvable the nominal amount
/// is carried through at rate 1 and flagged.
fn resolve_rate(
    invoice: &Invoice,
    rates: &dyn RateSource,
) -> Result<(Decimal, RateOrigin), MutabakatError> {
    if invoice.currency_code.eq_ignore_ascii_case("TRY") {
        return Ok((Decimal::ONE, RateOrigin::SameCurrency));
    }
    if let Some(rate) = invoice.embedded_rate {
        return Ok((rate, RateOrigin::Embedded));
    }
    if let Some(date) = invoice.issue_date {
        if let Some(resolved) = rates.rate_for(date, &invoice.currency_code)? {
            return Ok((resolved.rate, RateOrigin::Historical(resolved.effective_date)));
        }
    }
    warn!(
        invoice = %invoice.number,
        currency = %invoice.currency_code,
        "no conversion rate; using nominal amount"
    );
    Ok((Decimal::ONE, RateOrigin::NotFound))
}

fn lines_json(group: &PostingGroup) -> String {
    serde_json::to_string(&group.lines).unwrap_or_else(|_| "[]".into())
}
