use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use tenure_core::{DomainError, DomainResult, ProductId};

/// Length of the billing window a product grants, in whole days.
///
/// The value is signed so that malformed catalog rows can be represented and
/// rejected at subscription creation instead of being silently coerced.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionDuration(i32);

impl SubscriptionDuration {
    pub const MONTH: SubscriptionDuration = SubscriptionDuration(30);
    pub const YEAR: SubscriptionDuration = SubscriptionDuration(365);
    pub const LIFETIME: SubscriptionDuration = SubscriptionDuration(365 * 100);

    /// Longest duration a product may grant.
    pub const MAX_DAYS: i32 = 365 * 1000;

    pub fn from_days(days: i32) -> Self {
        Self(days)
    }

    pub fn days(self) -> i32 {
        self.0
    }

    /// Only durations in `1..=MAX_DAYS` can back a subscription.
    pub fn is_valid(self) -> bool {
        (1..=Self::MAX_DAYS).contains(&self.0)
    }

    pub fn to_chrono(self) -> Duration {
        Duration::days(i64::from(self.0))
    }
}

/// Basis points in one whole (100%).
const BPS_SCALE: u64 = 10_000;

/// Default tax rate: 10%.
pub const DEFAULT_TAX_RATE_BPS: u32 = 1_000;

/// A purchasable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    /// Net price in the smallest currency unit (e.g. cents).
    pub price: u64,
    /// Tax rate in basis points (1000 = 10%).
    pub tax_rate_bps: u32,
    pub duration: SubscriptionDuration,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        id: ProductId,
        name: impl Into<String>,
        price: u64,
        duration: SubscriptionDuration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            price,
            tax_rate_bps: DEFAULT_TAX_RATE_BPS,
            duration,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tax_rate_bps(mut self, bps: u32) -> Self {
        self.tax_rate_bps = bps;
        self
    }

    /// Tax amount, rounded half-up to the smallest currency unit.
    pub fn tax_amount(&self) -> u64 {
        let raw = u128::from(self.price) * u128::from(self.tax_rate_bps);
        let scale = u128::from(BPS_SCALE);
        ((raw + scale / 2) / scale) as u64
    }

    /// Gross price: net price plus tax.
    pub fn total_price(&self) -> u64 {
        self.price + self.tax_amount()
    }

    /// Catalog-level sanity checks applied before a product is stored.
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::invalid_field("name", "cannot be empty"));
        }
        if self.name.chars().count() > 100 {
            return Err(DomainError::invalid_field("name", "exceeds 100 characters"));
        }
        if let Some(desc) = &self.description {
            if desc.chars().count() > 255 {
                return Err(DomainError::invalid_field(
                    "description",
                    "exceeds 255 characters",
                ));
            }
        }
        if !self.duration.is_valid() {
            return Err(DomainError::invariant("product duration out of range"));
        }
        if u64::from(self.tax_rate_bps) > BPS_SCALE {
            return Err(DomainError::invalid_field("tax_rate_bps", "cannot exceed 100%"));
        }
        Ok(())
    }
}
