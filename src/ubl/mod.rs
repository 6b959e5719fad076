//! UBL-TR e-invoice document parsing.
//!
//! Converts a single GİB e-fatura / e-arşiv XML payload into a canonical
//! [`crate::core::Invoice`], independent of XML namespace prefixes.
//!
//! # Example
//!
//! ```no_run
//! use mutabakat::ubl::parse_invoice;
//!
//! let bytes = std::fs::read("ABC2025000000001.xml").unwrap();
//! let invoice = parse_invoice(&bytes, "ABC2025000000001.xml").unwrap();
//! println!("{} {} {}", invoice.number, invoice.gross_amount, invoice.currency_code);
//! ```

mod parser;

pub use parser::parse_invoice;
