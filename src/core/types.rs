use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::core::AccountChart;

/// A canonical e-invoice / e-archive document (one per UBL-TR XML payload).
///
/// Created once per parse and immutable thereafter. Duplicate invoice
/// numbers across containers are never merged; the first occurrence wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// Invoice number (unique business key, e.g. "ABC2025000000001").
    pub number: String,
    /// Issue date. `None` when the source document carried no parseable date.
    pub issue_date: Option<NaiveDate>,
    /// ISO 4217 currency code. Defaults to "TRY" when the document is silent.
    pub currency_code: String,
    /// Gross total (TaxInclusiveAmount, falling back to PayableAmount).
    pub gross_amount: Decimal,
    /// Tax-exclusive total (matrah). Inferred as gross − taxes when absent.
    pub tax_exclusive_amount: Decimal,
    /// Payable amount.
    pub payable_amount: Decimal,
    /// Sum of line extension amounts.
    pub line_extension_amount: Decimal,
    /// Document-level allowance (iskonto) total.
    pub allowance_total: Decimal,
    /// VAT only — tax subtotals with type code 0015. Other tax types are
    /// kept separately in `other_tax_amount` and excluded from VAT checks.
    pub vat_amount: Decimal,
    /// Non-VAT taxes (accommodation, stamp duty, ...).
    pub other_tax_amount: Decimal,
    /// Withholding (tevkifat) total.
    pub withholding_amount: Decimal,
    /// Exchange rate embedded in the document (PricingExchangeRate /
    /// PaymentExchangeRate CalculationRate). Takes precedence over any
    /// externally resolved historical rate.
    pub embedded_rate: Option<Decimal>,
    /// Seller identity.
    pub supplier: Party,
    /// Buyer identity.
    pub customer: Party,
    /// Ordered invoice lines.
    pub lines: Vec<InvoiceLine>,
    /// Per-subtotal tax breakdown as found in the document.
    pub tax_breakdown: Vec<TaxSubtotal>,
    /// Free-text notes.
    pub notes: Vec<String>,
    /// Despatch (irsaliye) document references, "ID (date)" formatted.
    pub despatch_refs: Vec<String>,
    /// Order references, "ID (date)" formatted.
    pub order_refs: Vec<String>,
    /// Payment means summaries (IBAN / channel).
    pub payment_means: Vec<String>,
    /// ETTN / document UUID.
    pub ettn: Option<String>,
    /// GİB profile (TICARIFATURA, EARSIVFATURA, ...).
    pub profile_id: Option<String>,
    /// UBL invoice type code (SATIS, IADE, ...).
    pub type_code: Option<String>,
    /// Name of the file the document was read from.
    pub source_file: String,
}

impl Invoice {
    /// VAT declaration period in "YYYY/MM" form, when the issue date is known.
    pub fn vat_period(&self) -> Option<String> {
        self.issue_date.map(|d| d.format("%Y/%m").to_string())
    }
}

/// A party on an invoice (supplier or customer).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Party {
    /// Resolved display name: registered legal name, falling back to
    /// trading name, then person first + last name, then "unknown".
    pub name: String,
    /// VKN (10-digit) or TCKN (11-digit) tax identifier.
    pub tax_id: Option<String>,
    /// Tax office (vergi dairesi).
    pub tax_office: Option<String>,
    /// Street + building number, single line.
    pub address: Option<String>,
    /// City.
    pub city: Option<String>,
    /// City subdivision (ilçe).
    pub district: Option<String>,
}

/// One invoice line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLine {
    /// Item name plus description when they differ.
    pub description: String,
    pub quantity: Decimal,
    /// Unit code from the quantity attribute ("C62", "NIU", ...).
    pub unit: String,
    pub unit_price: Decimal,
    /// Line VAT percentage.
    pub vat_rate: Decimal,
    /// Line extension amount.
    pub line_total: Decimal,
}

/// One tax subtotal as declared in the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxSubtotal {
    /// GİB tax type code ("0015" = KDV).
    pub type_code: String,
    pub rate: Decimal,
    pub taxable_amount: Decimal,
    pub tax_amount: Decimal,
}

/// GİB tax type code for value-added tax. Everything else is "other tax".
pub const TAX_TYPE_VAT: &str = "0015";

/// Document direction relative to the ledger owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Purchase invoice — the ledger owner is the customer.
    Incoming,
    /// Sales invoice — the ledger owner is the supplier.
    Outgoing,
    /// Owner invoices itself (ihraç kayıtlı and similar constructs).
    SelfIssued,
    /// The owner's tax id is unknown or matches neither party.
    Unknown,
}

impl Direction {
    /// Derive the direction by comparing both party tax ids against the
    /// ledger owner's tax id.
    pub fn infer(owner: Option<&str>, supplier: Option<&str>, customer: Option<&str>) -> Self {
        let Some(owner) = owner else {
            return Self::Unknown;
        };
        let supplier_is_owner = supplier == Some(owner);
        let customer_is_owner = customer == Some(owner);
        match (supplier_is_owner, customer_is_owner) {
            (true, true) => Self::SelfIssued,
            (true, false) => Self::Outgoing,
            (false, true) => Self::Incoming,
            (false, false) => Self::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Incoming => "incoming",
            Self::Outgoing => "outgoing",
            Self::SelfIssued => "self-issued",
            Self::Unknown => "unknown",
        }
    }
}

/// Debit/credit leg indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Debit,
    Credit,
}

impl Side {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Debit => "D",
            Self::Credit => "C",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "D" => Some(Self::Debit),
            "C" => Some(Self::Credit),
            _ => None,
        }
    }
}

/// One ledger journal line. Amounts are always positive; the direction is
/// carried by `side`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingLine {
    /// Hierarchical account code ("320.01.001").
    pub account: String,
    pub side: Side,
    pub amount: Decimal,
    pub description: String,
}

/// All ledger lines sharing one document/voucher number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingGroup {
    pub document_number: String,
    pub date: Option<NaiveDate>,
    /// Document type inherited from the entries ("invoice", "other", ...).
    pub doc_type: String,
    /// First non-empty line description.
    pub description: String,
    /// Counterparty title where the source exposes one (Kebir exports).
    pub counterparty: Option<String>,
    /// Distinct account codes touched by the group.
    pub accounts: BTreeSet<String>,
    /// Amount of record used for matching. For e-Defter sources this is the
    /// sum of debit legs; Kebir sources override it via the account-prefix
    /// priority table.
    pub total_debit: Decimal,
    /// Sum of postings on VAT input/output accounts.
    pub vat_total: Decimal,
    pub lines: Vec<PostingLine>,
}

impl PostingGroup {
    pub fn new(document_number: impl Into<String>) -> Self {
        Self {
            document_number: document_number.into(),
            date: None,
            doc_type: "other".into(),
            description: String::new(),
            counterparty: None,
            accounts: BTreeSet::new(),
            total_debit: Decimal::ZERO,
            vat_total: Decimal::ZERO,
            lines: Vec::new(),
        }
    }

    /// Append a journal line, maintaining the derived totals.
    pub fn record_line(&mut self, line: PostingLine, chart: &AccountChart) {
        self.accounts.insert(line.account.clone());
        if line.side == Side::Debit {
            self.total_debit += line.amount;
        }
        if chart.is_vat_account(&line.account) {
            self.vat_total += line.amount;
        }
        if self.description.is_empty() && !line.description.is_empty() {
            self.description = line.description.clone();
        }
        self.lines.push(line);
    }
}

/// A parsed ledger source: posting groups in first-seen order, indexed by
/// document number, plus the owner tax id when the source declares one.
#[derive(Debug, Clone, Default)]
pub struct LedgerBook {
    /// VKN of the taxpayer the ledger belongs to.
    pub owner_tax_id: Option<String>,
    groups: Vec<PostingGroup>,
    index: HashMap<String, usize>,
}

impl LedgerBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn contains(&self, document_number: &str) -> bool {
        self.index.contains_key(document_number)
    }

    pub fn get(&self, document_number: &str) -> Option<&PostingGroup> {
        self.index.get(document_number).map(|&i| &self.groups[i])
    }

    /// Posting groups in first-seen order. Fallback-key candidate selection
    /// depends on this ordering staying stable.
    pub fn groups(&self) -> &[PostingGroup] {
        &self.groups
    }

    pub fn get_mut(&mut self, document_number: &str) -> Option<&mut PostingGroup> {
        self.index
            .get(document_number)
            .map(|&i| &mut self.groups[i])
    }

    pub fn groups_mut(&mut self) -> impl Iterator<Item = &mut PostingGroup> {
        self.groups.iter_mut()
    }

    /// Fetch the group for a document number, creating it on first sight.
    pub fn group_mut(&mut self, document_number: &str) -> &mut PostingGroup {
        let i = match self.index.get(document_number) {
            Some(&i) => i,
            None => {
                let i = self.groups.len();
                self.index.insert(document_number.to_string(), i);
                self.groups.push(PostingGroup::new(document_number));
                i
            }
        };
        &mut self.groups[i]
    }

    /// Consume the book, yielding its groups in first-seen order.
    pub fn into_groups(self) -> Vec<PostingGroup> {
        self.groups
    }

    /// Insert a complete group. Returns `false` (leaving the existing group
    /// untouched) when the document number is already present.
    pub fn insert(&mut self, group: PostingGroup) -> bool {
        if self.index.contains_key(&group.document_number) {
            return false;
        }
        self.index
            .insert(group.document_number.clone(), self.groups.len());
        self.groups.push(group);
        true
    }
}

/// Per-source batch counters surfaced alongside structured log entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCounters {
    /// Documents parsed into canonical records.
    pub parsed: usize,
    /// Entries skipped by policy (unsupported extension, duplicate key).
    pub skipped: usize,
    /// Per-document or per-container failures.
    pub failed: usize,
}

impl SourceCounters {
    pub fn absorb(&mut self, other: SourceCounters) {
        self.parsed += other.parsed;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// How an invoice was paired with a posting group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMethod {
    /// Invoice number found directly in the ledger index.
    ExactNumber,
    /// Composite (date, truncated amount) key match.
    FallbackKey,
    /// No ledger counterpart.
    None,
}

/// Where the conversion rate applied to an invoice came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateOrigin {
    /// Amount was already in local currency; rate 1.
    SameCurrency,
    /// Rate embedded in the invoice document itself.
    Embedded,
    /// Historical rate published on the given effective date.
    Historical(NaiveDate),
    /// No rate could be resolved; the nominal amount was used.
    NotFound,
}

impl RateOrigin {
    pub fn label(&self) -> String {
        match self {
            Self::SameCurrency => "same currency".into(),
            Self::Embedded => "invoice document".into(),
            Self::Historical(d) => format!("TCMB {}", d.format("%d.%m.%Y")),
            Self::NotFound => "not found".into(),
        }
    }
}

/// Classification of one reconciled invoice or residual posting group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconStatus {
    /// Ledger counterpart found, amount and VAT within tolerance.
    Matched,
    /// Converted amount differs from the ledger total beyond tolerance.
    AmountMismatch,
    /// Invoice VAT differs from the ledger VAT-account total.
    VatMismatch,
    /// Both differences exceed tolerance.
    AmountAndVatMismatch,
    /// Invoice with no ledger counterpart at all.
    Unrecorded,
    /// Ledger posting group with no supporting invoice document.
    Undocumented,
}

impl ReconStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Matched => "Matched",
            Self::AmountMismatch => "Amount mismatch",
            Self::VatMismatch => "VAT mismatch",
            Self::AmountAndVatMismatch => "Amount + VAT mismatch",
            Self::Unrecorded => "Unrecorded",
            Self::Undocumented => "Undocumented",
        }
    }
}

/// One row of the reconciliation output dataset — the sole contract with
/// external report generators. Never mutated after the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconRecord {
    pub invoice_number: String,
    pub date: Option<NaiveDate>,
    pub direction: Direction,
    pub currency: String,
    /// Gross amount in the original currency.
    pub original_amount: Decimal,
    /// Conversion rate applied.
    pub rate: Decimal,
    pub rate_origin: RateOrigin,
    /// Local-currency (TRY) equivalent used for matching.
    pub converted_amount: Decimal,
    /// Matched posting group's amount of record.
    pub ledger_amount: Decimal,
    /// converted_amount − ledger_amount.
    pub amount_diff: Decimal,
    /// Invoice VAT converted to local currency.
    pub invoice_vat: Decimal,
    /// Matched group's VAT-account total.
    pub ledger_vat: Decimal,
    /// invoice_vat − ledger_vat.
    pub vat_diff: Decimal,
    pub status: ReconStatus,
    pub match_method: MatchMethod,
    /// Document number of the matched posting group, if any.
    pub matched_document: Option<String>,
    /// Account-compliance findings, "; " joined.
    pub compliance_notes: String,
    pub source_file: String,
    /// Matched posting lines serialized as JSON for audit drill-down.
    pub matched_lines_json: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn direction_inference() {
        let owner = Some("1234567890");
        assert_eq!(
            Direction::infer(owner, Some("1234567890"), Some("9999999999")),
            Direction::Outgoing
        );
        assert_eq!(
            Direction::infer(owner, Some("9999999999"), Some("1234567890")),
            Direction::Incoming
        );
        assert_eq!(
            Direction::infer(owner, Some("1234567890"), Some("1234567890")),
            Direction::SelfIssued
        );
        assert_eq!(
            Direction::infer(None, Some("1"), Some("2")),
            Direction::Unknown
        );
    }

    #[test]
    fn posting_group_totals() {
        let chart = AccountChart::default();
        let mut group = PostingGroup::new("FIS-1");
        group.record_line(
            PostingLine {
                account: "153.01".into(),
                side: Side::Debit,
                amount: dec!(1000),
                description: "mal alımı".into(),
            },
            &chart,
        );
        group.record_line(
            PostingLine {
                account: "191.01".into(),
                side: Side::Debit,
                amount: dec!(200),
                description: String::new(),
            },
            &chart,
        );
        group.record_line(
            PostingLine {
                account: "320.01".into(),
                side: Side::Credit,
                amount: dec!(1200),
                description: String::new(),
            },
            &chart,
        );
        assert_eq!(group.total_debit, dec!(1200));
        assert_eq!(group.vat_total, dec!(200));
        assert_eq!(group.accounts.len(), 3);
        assert_eq!(group.description, "mal alımı");
    }

    #[test]
    fn ledger_book_first_insert_wins() {
        let mut book = LedgerBook::new();
        let mut first = PostingGroup::new("A1");
        first.doc_type = "invoice".into();
        assert!(book.insert(first));
        let second = PostingGroup::new("A1");
        assert!(!book.insert(second));
        assert_eq!(book.get("A1").unwrap().doc_type, "invoice");
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn rate_origin_labels() {
        assert_eq!(RateOrigin::SameCurrency.label(), "same currency");
        let d = NaiveDate::from_ymd_opt(2025, 10, 3).unwrap();
        assert_eq!(RateOrigin::Historical(d).label(), "TCMB 03.10.2025");
    }
}
