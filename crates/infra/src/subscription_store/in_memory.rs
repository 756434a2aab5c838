use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::{info, instrument};

use tenure_catalog::Product;
use tenure_core::{Clock, ExpectedVersion, SubscriptionId, SystemClock};
use tenure_subscriptions::{ExpiryPolicy, Subscription, Transition, decide_create};

use super::{SubscriptionStore, parse_subscription_id};
use crate::error::StoreError;
use crate::guard::ConcurrencyGuard;

type Rows = HashMap<SubscriptionId, Subscription>;

/// In-memory subscription store.
///
/// Intended for tests/dev. The whole map sits behind one write lock that is
/// held for the full read-modify-write of each operation, so mutations on
/// different subscriptions serialize as well.
pub struct InMemorySubscriptionStore {
    rows: RwLock<Rows>,
    clock: Arc<dyn Clock>,
    guard: ConcurrencyGuard,
}

impl std::fmt::Debug for InMemorySubscriptionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySubscriptionStore")
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

impl Default for InMemorySubscriptionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            clock,
            guard: ConcurrencyGuard::default(),
        }
    }

    pub fn with_policy(mut self, policy: ExpiryPolicy) -> Self {
        self.guard = ConcurrencyGuard::new(policy);
        self
    }

    /// Number of stored subscriptions.
    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw persisted row, bypassing lazy expiry. Test helper.
    pub fn peek(&self, id: SubscriptionId) -> Option<Subscription> {
        self.rows.read().ok()?.get(&id).cloned()
    }

    /// Overwrite a row as-is. Used to stage inconsistent or historic state.
    pub fn insert_raw(&self, subscription: Subscription) -> Result<(), StoreError> {
        self.write()?.insert(subscription.id, subscription);
        Ok(())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Rows>, StoreError> {
        self.rows
            .write()
            .map_err(|_| StoreError::Database("lock poisoned".to_string()))
    }

    fn mutate(
        &self,
        id: &str,
        expected: ExpectedVersion,
        transition: Transition,
    ) -> Result<Subscription, StoreError> {
        let id = parse_subscription_id(id)?;
        let mut rows = self.write()?;
        let locked = rows.get(&id).ok_or(StoreError::NotFound)?;

        let next = self
            .guard
            .apply(locked, expected, transition, self.clock.now())?;
        rows.insert(id, next.clone());

        info!(
            subscription_id = %id,
            transition = transition.name(),
            version = %next.version,
            "subscription updated"
        );
        Ok(next)
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    #[instrument(skip(self, product), fields(product_id = ?product.map(|p| p.id)), err)]
    async fn create(
        &self,
        user_id: &str,
        product: Option<&Product>,
    ) -> Result<Subscription, StoreError> {
        let created = decide_create(user_id, product, self.clock.now())?;
        self.write()?.insert(created.id, created.clone());
        Ok(created)
    }

    #[instrument(skip(self), err)]
    async fn get(&self, id: &str) -> Result<Subscription, StoreError> {
        let id = parse_subscription_id(id)?;
        let mut rows = self.write()?;
        let locked = rows.get(&id).ok_or(StoreError::NotFound)?;

        match self.guard.refresh(locked, self.clock.now())? {
            Some(expired) => {
                info!(subscription_id = %id, version = %expired.version, "subscription expired");
                rows.insert(id, expired.clone());
                Ok(expired)
            }
            None => Ok(locked.clone()),
        }
    }

    #[instrument(skip(self), err)]
    async fn pause(&self, id: &str, expected: ExpectedVersion) -> Result<Subscription, StoreError> {
        self.mutate(id, expected, Transition::Pause)
    }

    #[instrument(skip(self), err)]
    async fn unpause(
        &self,
        id: &str,
        expected: ExpectedVersion,
    ) -> Result<Subscription, StoreError> {
        self.mutate(id, expected, Transition::Unpause)
    }

    #[instrument(skip(self), err)]
    async fn cancel(
        &self,
        id: &str,
        expected: ExpectedVersion,
    ) -> Result<Subscription, StoreError> {
        self.mutate(id, expected, Transition::Cancel)
    }
}
