//! General-ledger document parsing.
//!
//! Two source formats produce the same canonical [`LedgerBook`]:
//!
//! * **e-Defter** — the official XBRL GL export, streamed by [`edefter`].
//! * **Kebir HTML** — legacy reports from third-party accounting software,
//!   lexed and re-assembled by [`kebir`].
//!
//! [`load_ledger`] dispatches on the file extension; [`merge_ledgers`]
//! combines several sources into one book under a first-wins policy.

mod edefter;
mod kebir;

pub use edefter::parse_edefter;
pub use kebir::{KebirRow, parse_kebir_html};

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

use crate::core::{AccountChart, LedgerBook, MutabakatError};

/// Load a ledger file, choosing the parser by extension.
///
/// `.htm` / `.html` files go through the Kebir HTML parser; everything
/// else is treated as an e-Defter XBRL export and streamed from disk.
/// An unreadable or unparseable ledger is a fatal error: reconciliation
/// without a ledger is meaningless.
pub fn load_ledger(path: &Path, chart: &AccountChart) -> Result<LedgerBook, MutabakatError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    info!(path = %path.display(), format = %ext, "loading ledger");
    if ext == "htm" || ext == "html" {
        let bytes = std::fs::read(path)?;
        parse_kebir_html(&bytes, chart)
    } else {
        let file = File::open(path)?;
        parse_edefter(BufReader::new(file), chart)
    }
}

/// Merge several ledger books into one.
///
/// The first book to claim a document number keeps it; later duplicates
/// are dropped and counted. Owner tax ids are reconciled the same way,
/// with a warning when two sources disagree.
pub fn merge_ledgers(books: Vec<LedgerBook>) -> (LedgerBook, usize) {
    let mut merged = LedgerBook::new();
    let mut conflicts = 0usize;

    for book in books {
        match (&merged.owner_tax_id, &book.owner_tax_id) {
            (None, Some(_)) => merged.owner_tax_id = book.owner_tax_id.clone(),
            (Some(kept), Some(seen)) if kept != seen => {
                warn!(kept = %kept, seen = %seen, "ledger owner tax id mismatch");
            }
            _ => {}
        }
        for group in book.into_groups() {
            let document_number = group.document_number.clone();
            if !merged.insert(group) {
                warn!(document = %document_number, "duplicate ledger document dropped");
                conflicts += 1;
            }
        }
    }

    info!(
        documents = merged.len(),
        conflicts, "ledger sources merged"
    );
    (merged, conflicts)
}
