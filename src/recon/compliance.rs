//! Account-compliance checks on matched posting groups and the heuristic
//! that flags unmatched groups as undocumented invoices.

use rust_decimal::Decimal;

use crate::core::{AccountChart, Direction, PostingGroup};

/// Check a matched posting group against the account pattern its invoice
/// direction requires. Returns one note per missing posting.
pub(crate) fn compliance_notes(
    direction: Direction,
    invoice_vat: Decimal,
    group: &PostingGroup,
    chart: &AccountChart,
) -> Vec<String> {
    let has = |prefixes: &[String]| AccountChart::set_has_prefix(&group.accounts, prefixes);
    let mut notes = Vec::new();

    match direction {
        Direction::Outgoing => {
            if !has(&chart.sales_revenue_prefixes) {
                notes.push("no sales revenue posting (600/601/602)".into());
            }
            if invoice_vat > Decimal::ZERO && !has(&chart.vat_output_prefixes) {
                notes.push("VAT charged but no output VAT posting (391)".into());
            }
            if !has(&chart.sales_settlement_prefixes) {
                notes.push("no receivable or cash settlement posting (120/100/102)".into());
            }
        }
        Direction::Incoming => {
            if invoice_vat > Decimal::ZERO && !has(&chart.vat_input_prefixes) {
                notes.push("VAT charged but no input VAT posting (191)".into());
            }
            if !has(&chart.purchase_settlement_prefixes) {
                notes.push("no payable or cash settlement posting (320/100/102)".into());
            }
        }
        // Export-registered and similar self-billed constructs post both
        // legs in one voucher.
        Direction::SelfIssued => {
            if !has(&chart.self_sales_prefixes) {
                notes.push("no sales leg (600/601/391)".into());
            }
            if !has(&chart.self_purchase_prefixes) {
                notes.push("no purchase leg (150-153/770/191)".into());
            }
        }
        Direction::Unknown => {}
    }
    notes
}

/// Whether an unmatched posting group looks like an invoice that was booked
/// without a supporting document.
///
/// A group qualifies when it touches at least one critical account, is not
/// a financial or valuation voucher (an excluded cash/bank/payroll/FX
/// account with no VAT account posted — those need no invoice), and its
/// total debit reaches the materiality threshold.
pub(crate) fn looks_undocumented(
    group: &PostingGroup,
    chart: &AccountChart,
    materiality: Decimal,
) -> bool {
    if !AccountChart::set_has_prefix(&group.accounts, &chart.undocumented_critical_prefixes) {
        return false;
    }
    let excluded =
        AccountChart::set_has_prefix(&group.accounts, &chart.undocumented_excluded_prefixes);
    let has_vat = group.accounts.iter().any(|a| chart.is_vat_account(a));
    if excluded && !has_vat {
        return false;
    }
    group.total_debit >= materiality
}
