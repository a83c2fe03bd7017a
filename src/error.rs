//! Error taxonomy for the emission pipeline

/// A single business-rule violation found by the validator.
///
/// Validation is exhaustive: the validator collects every violation instead
/// of stopping at the first, so callers always get the complete report.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("issuer identification (CNPJ) is missing")]
    MissingIssuer,
    #[error("document has no line items")]
    NoItems,
    #[error("item {item}: {reason}")]
    InvalidItem { item: u16, reason: String },
    #[error("NFC-e requires at least one payment")]
    MissingPayment,
    #[error("payments sum to {payments} centavos but document total is {total}")]
    PaymentMismatch { total: u64, payments: u64 },
    #[error("NFC-e total of {total} centavos exceeds the 5000.00 ceiling")]
    ValueCeilingExceeded { total: u64 },
    #[error("NFe requires an identified recipient (CPF/CNPJ)")]
    MissingRecipient,
    #[error("declared total {declared} centavos does not match computed total {computed}")]
    TotalMismatch { declared: u64, computed: u64 },
}

/// Failures of the emission pipeline itself, one variant per terminal cause.
#[derive(thiserror::Error, Debug)]
pub enum EmissionError {
    #[error("invalid document identity: {0}")]
    InvalidIdentity(String),
    /// The backing counter store failed. Non-retryable for this request: a
    /// number must never be guessed.
    #[error("sequence allocation failed: {0}")]
    Allocation(String),
    #[error("document failed validation with {} violation(s)", .0.len())]
    ValidationFailed(Vec<ValidationError>),
    /// A number was allocated but the access key could not be derived. The
    /// number is burned; the document must be rebuilt with a fresh one.
    #[error("key assignment failed for number {number}: {reason}")]
    KeyAssignmentFailed { number: u32, reason: String },
    #[error("authority rejected the document: status {status} - {reason}")]
    Rejected { status: u16, reason: String },
    #[error("cancellation refused: {0}")]
    Cancellation(String),
    /// Submission went out but no definitive answer came back within the
    /// retry budget. The record stays `Submitted`; resolve with `query`.
    #[error("authority outcome unknown for key {key}; an explicit query is required")]
    UnknownStatus { key: String },
    #[error("no record found for key {0}")]
    NotFound(String),
    #[error("persistence failure: {0}")]
    Store(String),
}

impl From<sled::Error> for EmissionError {
    fn from(err: sled::Error) -> Self {
        EmissionError::Store(err.to_string())
    }
}
