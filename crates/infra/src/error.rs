//! Storage-facing error types.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | Mapped to | Scenario |
//! |------------|----------------------|-----------|----------|
//! | Database (foreign key violation) | `23503` | `NotFound` | Subscription created for a product that is not in the catalog table |
//! | Database (check constraint violation) | `23514` | `Consistency` | Row would break a schema-level invariant |
//! | Database (other) | Any other | `Database` | Other database errors |
//! | PoolClosed / Io / Tls / ... | N/A | `Database` | Connectivity failures |

use thiserror::Error;

use tenure_core::Version;
use tenure_subscriptions::{LifecycleError, SubscriptionStatus};

/// Failure of a subscription store operation.
///
/// Every variant is terminal for the operation that produced it: the enclosing
/// transaction was rolled back and nothing was persisted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("not found")]
    NotFound,

    #[error("product reference required")]
    ProductRequired,

    #[error("product duration out of range (got {0} days)")]
    InvalidProductDuration(i32),

    #[error("subscription cannot be paused while {0}")]
    CannotPause(SubscriptionStatus),

    #[error("subscription cannot be unpaused while {0}")]
    CannotUnpause(SubscriptionStatus),

    #[error("subscription is already cancelled")]
    CannotCancel,

    /// The caller's expected version is stale.
    #[error("concurrent modification: expected version {expected}, found {actual}")]
    ConcurrentModification { expected: Version, actual: Version },

    /// Stored state violates a lifecycle invariant. Always a defect.
    #[error("consistency fault: {0}")]
    Consistency(String),

    #[error("storage failure: {0}")]
    Database(String),
}

impl StoreError {
    /// Only version conflicts can succeed on a retry (after re-reading).
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::ConcurrentModification { .. })
    }

    /// Whether the error signals a defect rather than a caller mistake.
    pub fn is_internal(&self) -> bool {
        matches!(self, StoreError::Consistency(_) | StoreError::Database(_))
    }
}

impl From<LifecycleError> for StoreError {
    fn from(value: LifecycleError) -> Self {
        match value {
            LifecycleError::ProductRequired => StoreError::ProductRequired,
            LifecycleError::InvalidProductDuration(days) => StoreError::InvalidProductDuration(days),
            LifecycleError::InvalidIdentifier(msg) => StoreError::InvalidIdentifier(msg),
            LifecycleError::CannotPause(status) => StoreError::CannotPause(status),
            LifecycleError::CannotUnpause(status) => StoreError::CannotUnpause(status),
            LifecycleError::CannotCancel => StoreError::CannotCancel,
            LifecycleError::Inconsistent(msg) => StoreError::Consistency(msg),
        }
    }
}

impl From<tenure_core::DomainError> for StoreError {
    fn from(value: tenure_core::DomainError) -> Self {
        match value {
            tenure_core::DomainError::InvalidId(msg) => StoreError::InvalidIdentifier(msg),
            other => StoreError::Consistency(other.to_string()),
        }
    }
}

/// Failure of a product catalog lookup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("product not found")]
    NotFound,

    #[error("invalid product: {0}")]
    InvalidProduct(String),

    #[error("storage failure: {0}")]
    Database(String),
}

impl From<tenure_core::DomainError> for CatalogError {
    fn from(value: tenure_core::DomainError) -> Self {
        match value {
            tenure_core::DomainError::InvalidId(msg) => CatalogError::InvalidIdentifier(msg),
            other => CatalogError::InvalidProduct(other.to_string()),
        }
    }
}

/// Map SQLx errors to [`StoreError`].
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());

            match db_err.code().as_deref() {
                // Foreign key violation: the referenced product does not exist
                Some("23503") => StoreError::NotFound,
                // Check constraint violation
                Some("23514") => StoreError::Consistency(msg),
                _ => StoreError::Database(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Database(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::RowNotFound => StoreError::NotFound,
        _ => StoreError::Database(format!("sqlx error in {}: {}", operation, err)),
    }
}

pub(crate) fn map_catalog_sqlx_error(operation: &str, err: sqlx::Error) -> CatalogError {
    match err {
        sqlx::Error::RowNotFound => CatalogError::NotFound,
        other => CatalogError::Database(format!("sqlx error in {}: {}", operation, other)),
    }
}
