//! # mutabakat
//!
//! Reconciles a taxpayer's electronic invoices (UBL-TR e-fatura / e-arşiv
//! documents) against the general ledger: detects unrecorded invoices,
//! undocumented postings, amount and KDV mismatches, and produces a flat
//! dataset ready for VAT-compliance reporting.
//!
//! All monetary values use [`rust_decimal::Decimal`] — never floating point.
//!
//! ## Pipeline
//!
//! ```text
//! archive::walk ─▶ ubl::parse_invoice ─▶ Invoice ─┐
//!                                                 ├─▶ recon::reconcile ─▶ ReconRecord
//! ledger::load_ledger ──▶ LedgerBook ─────────────┘         ▲
//!                                                  rates::RateSource
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Canonical invoice/ledger types, account chart |
//! | `ubl` | UBL-TR e-invoice XML parsing |
//! | `ledger` | e-Defter XBRL-GL and legacy Kebir HTML ledger parsing |
//! | `rates` | TCMB historical exchange-rate resolver |
//! | `archive` | Recursive zip/loose-file invoice discovery |
//! | `recon` | Reconciliation engine and output dataset |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(any(feature = "ubl", feature = "ledger"))]
pub mod encoding;

#[cfg(feature = "ubl")]
pub mod ubl;

#[cfg(feature = "ledger")]
pub mod ledger;

#[cfg(feature = "rates")]
pub mod rates;

#[cfg(feature = "archive")]
pub mod archive;

#[cfg(feature = "recon")]
pub mod recon;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
