use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Failure raised by the pure crates before anything reaches storage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Text that should name a record is not a well-formed identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A field holds a value outside its accepted range.
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// A value combination that can never be valid (e.g. a zero-day plan).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }
}
