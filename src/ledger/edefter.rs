//! e-Defter (XBRL GL) ledger parsing.
//!
//! The official e-Defter export nests one `entryDetail` element per journal
//! line under `gl-cor` namespaced tags. Exports run to hundreds of
//! megabytes, so the reader streams element-by-element and never holds more
//! than one entry in memory. Matching is by local tag name; the namespace
//! prefix varies between signing tools.

use quick_xml::Reader;
use quick_xml::events::Event;
use std::io::BufRead;
use tracing::{debug, info};

use crate::core::{
    AccountChart, LedgerBook, MutabakatError, PostingLine, Side, parse_decimal, parse_flex_date,
};

/// Parse an e-Defter kebir export from a buffered reader.
pub fn parse_edefter<R: BufRead>(
    reader: R,
    chart: &AccountChart,
) -> Result<LedgerBook, MutabakatError> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(true);

    let mut book = LedgerBook::new();
    let mut buf = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut entry: Option<EntryScratch> = None;

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = local_name(e.name().as_ref());
                if name == "entryDetail" {
                    entry = Some(EntryScratch::default());
                }
                path.push(name);
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().trim().to_string();
                if let (false, Some(leaf)) = (text.is_empty(), path.last()) {
                    // The first xbrli:identifier is the ledger owner's VKN.
                    if leaf == "identifier" && book.owner_tax_id.is_none() {
                        debug!(vkn = %text, "ledger owner identified");
                        book.owner_tax_id = Some(text.clone());
                    }
                    if let Some(scratch) = entry.as_mut() {
                        scratch.take_field(leaf, &text);
                    }
                }
            }
            Ok(Event::End(_)) => {
                let ended = path.pop().unwrap_or_default();
                if ended == "entryDetail" {
                    if let Some(scratch) = entry.take() {
                        scratch.commit(&mut book, chart);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(MutabakatError::Ledger(format!("e-Defter parse error: {e}")));
            }
            _ => {}
        }
        buf.clear();
    }

    info!(
        documents = book.len(),
        owner = book.owner_tax_id.as_deref().unwrap_or("?"),
        "e-Defter loaded"
    );
    Ok(book)
}

fn local_name(qname: &[u8]) -> String {
    let name = std::str::from_utf8(qname).unwrap_or("");
    name.rsplit(':').next().unwrap_or(name).to_string()
}

#[derive(Default)]
struct EntryScratch {
    document_number: Option<String>,
    amount: Option<String>,
    debit_credit: Option<String>,
    account: Option<String>,
    posting_date: Option<String>,
    doc_type: Option<String>,
    comment: Option<String>,
}

impl EntryScratch {
    fn take_field(&mut self, leaf: &str, text: &str) {
        match leaf {
            "documentNumber" => self.document_number = Some(text.to_string()),
            "amount" => self.amount = Some(text.to_string()),
            "debitCreditCode" => self.debit_credit = Some(text.to_string()),
            "accountMainID" => self.account = Some(text.to_string()),
            "postingDate" => self.posting_date = Some(text.to_string()),
            "documentType" => self.doc_type = Some(text.to_string()),
            "entryComment" => self.comment = Some(text.to_string()),
            _ => {}
        }
    }

    /// Fold the completed entry into its posting group. Entries without a
    /// document number cannot be reconciled and are dropped.
    fn commit(self, book: &mut LedgerBook, chart: &AccountChart) {
        let Some(doc_no) = self.document_number.filter(|d| !d.is_empty()) else {
            return;
        };
        let is_new = !book.contains(&doc_no);
        let group = book.group_mut(&doc_no);
        if is_new {
            group.date = self.posting_date.as_deref().and_then(parse_flex_date);
            group.doc_type = self.doc_type.unwrap_or_else(|| "other".into());
        }
        let side = self
            .debit_credit
            .as_deref()
            .and_then(Side::from_code)
            .unwrap_or(Side::Credit);
        group.record_line(
            PostingLine {
                account: self.account.unwrap_or_default(),
                side,
                amount: self.amount.as_deref().map(parse_decimal).unwrap_or_default(),
                description: self.comment.unwrap_or_default(),
            },
            chart,
        );
    }
}
