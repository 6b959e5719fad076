//! Legacy Kebir HTML ledger parsing.
//!
//! Third-party accounting packages export the kebir as HTML where every
//! logical field is its own styled `div` — there is no row structure at
//! all, just a flat sequence of styled fragments. The parser therefore runs
//! in two stages: a lexer that turns the markup into `(style class, text)`
//! fragments, and an explicit accumulator that builds rows from them.
//!
//! Row completion is asymmetric, inherent to how the source software
//! renders its report: a credit-side row is flushed when a credit amount
//! greater than zero arrives, while a debit-only row (a 191 KDV leg, say)
//! is flushed by the running-balance cell that follows the debit amount.
//! Both triggers are kept separate so each can be tested on its own.

use regex::Regex;
use rust_decimal::Decimal;
use tracing::info;

use crate::core::{
    AccountChart, LedgerBook, MutabakatError, PostingLine, Side, parse_flex_date, parse_tr_amount,
};
use crate::encoding::decode_document;

/// Parse a Kebir HTML export into posting groups keyed by document number.
pub fn parse_kebir_html(bytes: &[u8], chart: &AccountChart) -> Result<LedgerBook, MutabakatError> {
    let text = decode_document(bytes);
    let fragments = lex_fragments(&text)?;

    let mut acc = RowAccumulator::new();
    for (class, content) in &fragments {
        acc.feed(class, content);
    }

    info!(rows = acc.rows.len(), "kebir HTML rows extracted");
    Ok(build_book(acc.rows, chart))
}

/// Lex the HTML into `(style class, text)` fragments in document order.
///
/// The reader runs with end-name checking off: these exports carry
/// unclosed markup that would fail as XML.
fn lex_fragments(html: &str) -> Result<Vec<(String, String)>, MutabakatError> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(html);
    reader.config_mut().check_end_names = false;
    reader.config_mut().trim_text(true);

    let mut fragments = Vec::new();
    let mut current_class: Option<String> = None;
    let mut buffer = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"div" => {
                let class = e.attributes().flatten().find_map(|a| {
                    (a.key.as_ref() == b"class")
                        .then(|| String::from_utf8_lossy(&a.value).into_owned())
                });
                current_class = class;
                buffer.clear();
            }
            Ok(Event::Text(ref e)) => {
                if current_class.is_some() {
                    // Numeric entities decode; anything else keeps its raw text.
                    match e.unescape() {
                        Ok(t) => buffer.push_str(&t),
                        Err(_) => {
                            buffer.push_str(&String::from_utf8_lossy(e.as_ref()));
                        }
                    }
                }
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"div" => {
                if let Some(class) = current_class.take() {
                    let text = buffer.trim().to_string();
                    if !text.is_empty() {
                        fragments.push((class, text));
                    }
                    buffer.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(MutabakatError::Ledger(format!("kebir HTML lex error: {e}")));
            }
            _ => {}
        }
    }
    Ok(fragments)
}

/// One completed kebir row (a single posting line in canonical form).
#[derive(Debug, Clone)]
pub struct KebirRow {
    pub account_code: String,
    pub date: Option<chrono::NaiveDate>,
    pub voucher_no: String,
    pub description: String,
    /// Invoice number pattern-matched out of the voucher number or the
    /// free-text description; the export has no dedicated field for it.
    pub invoice_no: Option<String>,
    pub counterparty: Option<String>,
    pub side: Side,
    pub amount: Decimal,
}

/// Scratch record for the row being assembled, one field per styled cell.
#[derive(Debug, Default, Clone)]
struct RowScratch {
    debit_date: Option<chrono::NaiveDate>,
    debit_voucher_no: String,
    debit_description: String,
    debit_invoice_no: Option<String>,
    debit_counterparty: Option<String>,
    debit: Decimal,

    credit_date: Option<chrono::NaiveDate>,
    credit_voucher_no: String,
    credit_description: String,
    credit_invoice_no: Option<String>,
    credit_counterparty: Option<String>,
    credit: Decimal,
}

struct RowAccumulator {
    invoice_pattern: Regex,
    current_account_code: Option<String>,
    scratch: RowScratch,
    rows: Vec<KebirRow>,
}

impl RowAccumulator {
    fn new() -> Self {
        Self {
            // GİB document numbers: 3-letter series + 13 digits.
            invoice_pattern: Regex::new(r"[A-Z]{3}\d{13}").expect("static pattern"),
            current_account_code: None,
            scratch: RowScratch::default(),
            rows: Vec::new(),
        }
    }

    fn find_invoice_no(&self, text: &str) -> Option<String> {
        self.invoice_pattern
            .find(text)
            .map(|m| m.as_str().to_string())
    }

    /// Counterparty title sits in the fourth comma-separated description field.
    fn find_counterparty(text: &str) -> Option<String> {
        let parts: Vec<&str> = text.split(',').collect();
        (parts.len() >= 4).then(|| parts[3].trim().to_string())
    }

    fn feed(&mut self, class: &str, text: &str) {
        match class {
            // Account header: numeric code cell, then the title cell.
            "style12" if text.chars().all(|c| c.is_ascii_digit()) => {
                self.current_account_code = Some(text.to_string());
            }

            // Debit-side cells
            "style29" => self.scratch.debit_date = parse_flex_date(text),
            "style31" => self.scratch.debit_voucher_no = text.to_string(),
            "style33" => {
                self.scratch.debit_description = text.to_string();
                if let Some(no) = self.find_invoice_no(text) {
                    self.scratch.debit_invoice_no = Some(no);
                }
                if let Some(title) = Self::find_counterparty(text) {
                    self.scratch.debit_counterparty = Some(title);
                }
            }
            "style34" => self.scratch.debit = parse_tr_amount(text),

            // Credit-side cells
            "style37" => self.scratch.credit_date = parse_flex_date(text),
            "style39" => {
                self.scratch.credit_voucher_no = text.to_string();
                if let Some(no) = self.find_invoice_no(text) {
                    self.scratch.credit_invoice_no = Some(no);
                }
            }
            "style41" => {
                self.scratch.credit_description = text.to_string();
                if let Some(no) = self.find_invoice_no(text) {
                    self.scratch.credit_invoice_no = Some(no);
                }
                if let Some(title) = Self::find_counterparty(text) {
                    self.scratch.credit_counterparty = Some(title);
                }
            }

            // Trigger 1: a positive credit amount completes a credit row.
            "style42" => {
                let credit = parse_tr_amount(text);
                if credit > Decimal::ZERO {
                    self.scratch.credit = credit;
                    self.flush_credit();
                }
            }

            // Trigger 2a: the debit running-balance cell ends a debit row.
            "style35" => {
                if self.scratch.debit > Decimal::ZERO {
                    self.flush_debit();
                }
            }

            // Trigger 2b: a credit balance directly after a debit with no
            // credit amount — single-sided debit postings render this way.
            "style36" => {
                if self.scratch.debit > Decimal::ZERO && self.scratch.credit.is_zero() {
                    self.flush_debit();
                }
            }

            _ => {}
        }
    }

    fn flush_credit(&mut self) {
        if let Some(account) = self.current_account_code.clone() {
            let s = std::mem::take(&mut self.scratch);
            self.rows.push(KebirRow {
                account_code: account,
                date: s.credit_date,
                voucher_no: s.credit_voucher_no,
                invoice_no: s.credit_invoice_no,
                counterparty: s.credit_counterparty,
                description: s.credit_description,
                side: Side::Credit,
                amount: s.credit,
            });
        } else {
            self.scratch = RowScratch::default();
        }
    }

    fn flush_debit(&mut self) {
        if let Some(account) = self.current_account_code.clone() {
            let s = std::mem::take(&mut self.scratch);
            self.rows.push(KebirRow {
                account_code: account,
                date: s.debit_date,
                voucher_no: s.debit_voucher_no,
                invoice_no: s.debit_invoice_no,
                counterparty: s.debit_counterparty,
                description: s.debit_description,
                side: Side::Debit,
                amount: s.debit,
            });
        } else {
            self.scratch = RowScratch::default();
        }
    }
}

/// Group completed rows by document number and pick each group's amount of
/// record via the account-prefix priority table.
fn build_book(rows: Vec<KebirRow>, chart: &AccountChart) -> LedgerBook {
    let mut book = LedgerBook::new();
    // (best priority, selected amount) per document, applied after grouping.
    let mut selections: std::collections::HashMap<String, (u8, Decimal)> =
        std::collections::HashMap::new();

    for row in rows {
        let doc_no = row
            .invoice_no
            .clone()
            .unwrap_or_else(|| row.voucher_no.clone());
        if doc_no.is_empty() {
            continue;
        }

        let is_new = !book.contains(&doc_no);
        let is_invoice = row.invoice_no.is_some();
        let group = book.group_mut(&doc_no);
        if is_new {
            group.date = row.date;
            group.doc_type = if is_invoice { "invoice".into() } else { "other".into() };
        }
        if group.counterparty.is_none() {
            group.counterparty = row.counterparty.clone();
        }

        let priority = chart.amount_priority(&row.account_code);
        let entry = selections.entry(doc_no).or_insert((0, Decimal::ZERO));
        match row.side {
            // On the debit side only the receivables control account (120)
            // carries the invoice figure; other debits are payments.
            Side::Debit => {
                if row.account_code.starts_with("120") && priority > entry.0 {
                    *entry = (priority, row.amount);
                }
            }
            Side::Credit => {
                if priority > entry.0 && row.amount > Decimal::ZERO {
                    *entry = (priority, row.amount);
                }
            }
        }

        group.record_line(
            PostingLine {
                account: row.account_code,
                side: row.side,
                amount: row.amount,
                description: row.description,
            },
            chart,
        );
    }

    // Apply the amount-of-record overrides; without any prioritized account
    // the largest single line stands in.
    apply_amount_of_record(&mut book, &selections);

    book
}

fn apply_amount_of_record(
    book: &mut LedgerBook,
    selections: &std::collections::HashMap<String, (u8, Decimal)>,
) {
    for group in book.groups_mut() {
        match selections.get(&group.document_number) {
            Some(&(_, amount)) if amount > Decimal::ZERO => {
                group.total_debit = amount;
            }
            _ => {
                if group.total_debit.is_zero() {
                    group.total_debit = group
                        .lines
                        .iter()
                        .map(|l| l.amount)
                        .max()
                        .unwrap_or(Decimal::ZERO);
                }
            }
        }
    }
}
