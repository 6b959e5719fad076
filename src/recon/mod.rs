//! Invoice / ledger reconciliation.
//!
//! [`reconcile`] walks the invoice batch once: resolves a conversion rate,
//! pairs each invoice with a posting group (exact document number first,
//! then a same-day same-amount fallback key), cross-checks the amount and
//! the VAT, and runs direction-specific account-compliance checks. A
//! residual pass flags unmatched posting groups that look like invoices
//! booked without a document.

mod compliance;
mod engine;

pub use engine::{ReconOptions, ReconReport, ReconSummary, reconcile};
