//! The default catalog: one monthly, one yearly and one lifetime plan.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use tenure_core::ProductId;

use crate::product::{Product, SubscriptionDuration};

pub const MONTHLY_PLAN_ID: Uuid = Uuid::from_u128(0x11111111_1111_1111_1111_111111111111);
pub const YEARLY_PLAN_ID: Uuid = Uuid::from_u128(0x22222222_2222_2222_2222_222222222222);
pub const LIFETIME_PLAN_ID: Uuid = Uuid::from_u128(0x33333333_3333_3333_3333_333333333333);

/// Products every fresh deployment starts with, ordered by duration.
pub fn default_products(now: DateTime<Utc>) -> Vec<Product> {
    vec![
        Product::new(
            ProductId::from_uuid(MONTHLY_PLAN_ID),
            "Monthly Plan",
            999,
            SubscriptionDuration::MONTH,
            now,
        )
        .with_description("Access all features for 1 month"),
        Product::new(
            ProductId::from_uuid(YEARLY_PLAN_ID),
            "Yearly Plan",
            9999,
            SubscriptionDuration::YEAR,
            now,
        )
        .with_description("Access all features for 1 year (15% discount)"),
        Product::new(
            ProductId::from_uuid(LIFETIME_PLAN_ID),
            "Lifetime Plan",
            29999,
            SubscriptionDuration::LIFETIME,
            now,
        )
        .with_description("Lifetime access (one-time payment)"),
    ]
}
