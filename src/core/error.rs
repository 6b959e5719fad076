use thiserror::Error;

/// Errors that can occur while parsing documents or running a reconciliation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MutabakatError {
    /// A single e-invoice document could not be parsed (malformed XML,
    /// missing mandatory total). Batch callers log this and continue.
    #[error("invoice document error: {0}")]
    Document(String),

    /// A ledger source could not be read or parsed.
    #[error("ledger error: {0}")]
    Ledger(String),

    /// An archive container could not be opened or walked.
    #[error("archive error: {0}")]
    Archive(String),

    /// Exchange-rate lookup transport or parse failure.
    #[error("rate lookup error: {0}")]
    Rate(String),

    /// Low-level XML reader/writer error.
    #[error("XML error: {0}")]
    Xml(String),

    /// Character-encoding detection or decoding failure.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
