//! Invoice discovery across directories and archive containers.
//!
//! GİB portal downloads arrive as zip files that routinely contain further
//! zip files (one per month, one per document type) before the actual UBL
//! payloads appear. The walker recurses through directories and nested
//! zips, feeding every XML payload to the invoice parser.
//!
//! Failure isolation is per entry: a malformed document or a corrupt
//! container is logged and counted, and its siblings keep flowing. Only an
//! unreadable root is fatal.

use std::collections::HashSet;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::core::{Invoice, MutabakatError, SourceCounters};
use crate::ubl::parse_invoice;

/// Nested-zip recursion limit. Real portal exports nest two levels deep;
/// anything past this is treated as a malformed container.
const MAX_ZIP_DEPTH: usize = 8;

/// Collect every invoice document under `root` (a directory, a zip file or
/// a single XML payload).
///
/// Duplicate invoice numbers across sources keep the first occurrence and
/// count the rest as skipped.
pub fn collect_invoices(root: &Path) -> Result<(Vec<Invoice>, SourceCounters), MutabakatError> {
    let mut collector = Collector::default();
    collector.walk(root)?;
    info!(
        parsed = collector.counters.parsed,
        skipped = collector.counters.skipped,
        failed = collector.counters.failed,
        "invoice discovery finished"
    );
    Ok((collector.invoices, collector.counters))
}

#[derive(Default)]
struct Collector {
    invoices: Vec<Invoice>,
    seen_numbers: HashSet<String>,
    counters: SourceCounters,
}

impl Collector {
    /// Walk a filesystem path. I/O errors at this level are fatal: the
    /// caller named the path, so an unreadable entry is a real problem.
    fn walk(&mut self, path: &Path) -> Result<(), MutabakatError> {
        if path.is_dir() {
            let mut entries: Vec<_> = std::fs::read_dir(path)?
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .map(|e| e.path())
                .collect();
            entries.sort();
            for entry in entries {
                self.walk(&entry)?;
            }
            return Ok(());
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        match extension_of(&name).as_str() {
            "xml" | "ubl" => {
                let bytes = std::fs::read(path)?;
                self.take_document(&bytes, &name);
            }
            "zip" => {
                let bytes = std::fs::read(path)?;
                self.scan_zip(&bytes, &name, 0);
            }
            "rar" => {
                warn!(file = %name, "rar containers are not supported");
                self.counters.failed += 1;
            }
            _ => {
                debug!(file = %name, "ignored by extension");
                self.counters.skipped += 1;
            }
        }
        Ok(())
    }

    /// Scan one zip container from memory, recursing into nested zips.
    fn scan_zip(&mut self, bytes: &[u8], label: &str, depth: usize) {
        if depth >= MAX_ZIP_DEPTH {
            warn!(container = %label, depth, "zip nesting limit reached");
            self.counters.failed += 1;
            return;
        }
        let mut zip = match ZipArchive::new(Cursor::new(bytes)) {
            Ok(z) => z,
            Err(e) => {
                warn!(container = %label, error = %e, "corrupt zip container");
                self.counters.failed += 1;
                return;
            }
        };
        debug!(container = %label, entries = zip.len(), depth, "scanning container");
        for i in 0..zip.len() {
            let (entry_name, payload) = {
                let mut file = match zip.by_index(i) {
                    Ok(f) => f,
                    Err(e) => {
                        warn!(container = %label, index = i, error = %e, "unreadable zip entry");
                        self.counters.failed += 1;
                        continue;
                    }
                };
                if file.is_dir() {
                    continue;
                }
                let name = file.name().to_string();
                let mut payload = Vec::with_capacity(file.size() as usize);
                if let Err(e) = file.read_to_end(&mut payload) {
                    warn!(container = %label, entry = %name, error = %e, "zip entry read failed");
                    self.counters.failed += 1;
                    continue;
                }
                (name, payload)
            };

            match extension_of(&entry_name).as_str() {
                "xml" | "ubl" => self.take_document(&payload, &entry_name),
                "zip" => self.scan_zip(&payload, &entry_name, depth + 1),
                "rar" => {
                    warn!(container = %label, entry = %entry_name, "rar containers are not supported");
                    self.counters.failed += 1;
                }
                _ => {
                    self.counters.skipped += 1;
                }
            }
        }
    }

    fn take_document(&mut self, bytes: &[u8], source_file: &str) {
        match parse_invoice(bytes, source_file) {
            Ok(invoice) => {
                if self.seen_numbers.insert(invoice.number.clone()) {
                    self.counters.parsed += 1;
                    self.invoices.push(invoice);
                } else {
                    debug!(number = %invoice.number, file = %source_file, "duplicate invoice number");
                    self.counters.skipped += 1;
                }
            }
            Err(e) => {
                warn!(file = %source_file, error = %e, "invoice parse failed");
                self.counters.failed += 1;
            }
        }
    }
}

fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}
