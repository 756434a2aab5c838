//! Subscription persistence.
//!
//! Every operation, including [`SubscriptionStore::get`], runs as a locked
//! read-modify-write on a single row. Reads can mutate: a subscription whose
//! end date has passed is expired and persisted (with a version bump) before
//! it is returned.

mod in_memory;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use tenure_catalog::Product;
use tenure_core::{ExpectedVersion, SubscriptionId};
use tenure_subscriptions::Subscription;

use crate::error::StoreError;

pub use in_memory::InMemorySubscriptionStore;
pub use postgres::PostgresSubscriptionStore;

/// Durable subscription storage with per-row atomic mutations.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Create an `Active` subscription at version 1.
    ///
    /// `product` is resolved by the caller; `None` yields
    /// [`StoreError::ProductRequired`].
    async fn create(
        &self,
        user_id: &str,
        product: Option<&Product>,
    ) -> Result<Subscription, StoreError>;

    /// Load a subscription, persisting lazy expiry first if it is due.
    async fn get(&self, id: &str) -> Result<Subscription, StoreError>;

    async fn pause(&self, id: &str, expected: ExpectedVersion) -> Result<Subscription, StoreError>;

    async fn unpause(
        &self,
        id: &str,
        expected: ExpectedVersion,
    ) -> Result<Subscription, StoreError>;

    async fn cancel(&self, id: &str, expected: ExpectedVersion)
    -> Result<Subscription, StoreError>;
}

#[async_trait]
impl<S> SubscriptionStore for Arc<S>
where
    S: SubscriptionStore + ?Sized,
{
    async fn create(
        &self,
        user_id: &str,
        product: Option<&Product>,
    ) -> Result<Subscription, StoreError> {
        (**self).create(user_id, product).await
    }

    async fn get(&self, id: &str) -> Result<Subscription, StoreError> {
        (**self).get(id).await
    }

    async fn pause(&self, id: &str, expected: ExpectedVersion) -> Result<Subscription, StoreError> {
        (**self).pause(id, expected).await
    }

    async fn unpause(
        &self,
        id: &str,
        expected: ExpectedVersion,
    ) -> Result<Subscription, StoreError> {
        (**self).unpause(id, expected).await
    }

    async fn cancel(
        &self,
        id: &str,
        expected: ExpectedVersion,
    ) -> Result<Subscription, StoreError> {
        (**self).cancel(id, expected).await
    }
}

/// Parse a caller-supplied subscription id, trimming surrounding whitespace.
pub(crate) fn parse_subscription_id(raw: &str) -> Result<SubscriptionId, StoreError> {
    raw.parse::<SubscriptionId>().map_err(StoreError::from)
}
