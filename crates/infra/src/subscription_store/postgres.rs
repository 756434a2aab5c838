//! Postgres-backed subscription store.
//!
//! ## Locking
//!
//! Every operation that may write (including `get`, because of lazy expiry)
//! runs inside one transaction:
//!
//! 1. `SELECT ... FOR UPDATE` locks the row for the rest of the transaction
//! 2. [`ConcurrencyGuard`] checks the expected version and decides the next snapshot
//! 3. `UPDATE ... WHERE id = $1 AND version = $2` persists it
//! 4. commit
//!
//! The `version` predicate in step 3 can only miss if something bypassed the
//! lock; that case is reported as a consistency fault. Different rows never
//! contend with each other.
//!
//! ## Thread Safety
//!
//! `PostgresSubscriptionStore` is `Send + Sync`; all connection handling goes
//! through the SQLx pool.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{Span, field, info, instrument, warn};

use tenure_catalog::Product;
use tenure_core::{Clock, ExpectedVersion, ProductId, SubscriptionId, SystemClock, UserId, Version};
use tenure_subscriptions::{ExpiryPolicy, Subscription, SubscriptionStatus, Transition, decide_create};

use super::{SubscriptionStore, parse_subscription_id};
use crate::error::{StoreError, map_sqlx_error};
use crate::guard::ConcurrencyGuard;

#[derive(Clone)]
pub struct PostgresSubscriptionStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    guard: ConcurrencyGuard,
}

impl std::fmt::Debug for PostgresSubscriptionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresSubscriptionStore")
            .field("pool", &self.pool)
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

impl PostgresSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            clock: Arc::new(SystemClock),
            guard: ConcurrencyGuard::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: ExpiryPolicy) -> Self {
        self.guard = ConcurrencyGuard::new(policy);
        self
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }

    async fn mutate(
        &self,
        id: &str,
        expected: ExpectedVersion,
        transition: Transition,
    ) -> Result<Subscription, StoreError> {
        let id = parse_subscription_id(id)?;
        let mut tx = self.begin().await?;

        let locked = match lock_row(&mut tx, id).await {
            Ok(Some(row)) => row,
            Ok(None) => return Err(abort(tx, StoreError::NotFound).await),
            Err(e) => return Err(abort(tx, e).await),
        };

        let next = match self
            .guard
            .apply(&locked, expected, transition, self.clock.now())
        {
            Ok(next) => next,
            Err(e) => return Err(abort(tx, e).await),
        };

        let saved = match write_row(&mut tx, &next, locked.version).await {
            Ok(saved) => saved,
            Err(e) => return Err(abort(tx, e).await),
        };

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Span::current().record("version", saved.version.get());
        info!(
            subscription_id = %saved.id,
            transition = transition.name(),
            version = %saved.version,
            "subscription updated"
        );
        Ok(saved)
    }
}

#[async_trait]
impl SubscriptionStore for PostgresSubscriptionStore {
    #[instrument(
        skip(self, product),
        fields(product_id = ?product.map(|p| p.id), subscription_id = field::Empty),
        err
    )]
    async fn create(
        &self,
        user_id: &str,
        product: Option<&Product>,
    ) -> Result<Subscription, StoreError> {
        let created = decide_create(user_id, product, self.clock.now())?;

        let row = sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id,
                user_id,
                product_id,
                start_date,
                end_date,
                status,
                version,
                paused_at,
                cancelled_at,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING
                id, user_id, product_id, start_date, end_date, status,
                version, paused_at, cancelled_at, created_at, updated_at
            "#,
        )
        .bind(created.id.as_uuid())
        .bind(created.user_id.as_uuid())
        .bind(created.product_id.as_uuid())
        .bind(created.start_date)
        .bind(created.end_date)
        .bind(created.status.as_str())
        .bind(created.version.get() as i64)
        .bind(created.paused_at)
        .bind(created.cancelled_at)
        .bind(created.created_at)
        .bind(created.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_subscription", e))?;

        Span::current().record("subscription_id", field::display(created.id));
        decode(&row)
    }

    #[instrument(skip(self), fields(operation = "get", version = field::Empty), err)]
    async fn get(&self, id: &str) -> Result<Subscription, StoreError> {
        let id = parse_subscription_id(id)?;
        let mut tx = self.begin().await?;

        let locked = match lock_row(&mut tx, id).await {
            Ok(Some(row)) => row,
            Ok(None) => return Err(abort(tx, StoreError::NotFound).await),
            Err(e) => return Err(abort(tx, e).await),
        };

        let locked_version = locked.version;
        let current = match self.guard.refresh(&locked, self.clock.now()) {
            Ok(Some(expired)) => match write_row(&mut tx, &expired, locked.version).await {
                Ok(saved) => saved,
                Err(e) => return Err(abort(tx, e).await),
            },
            Ok(None) => locked,
            Err(e) => return Err(abort(tx, e).await),
        };

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        if current.version != locked_version {
            info!(subscription_id = %current.id, version = %current.version, "subscription expired");
        }
        Span::current().record("version", current.version.get());
        Ok(current)
    }

    #[instrument(skip(self), fields(operation = "pause", version = field::Empty), err)]
    async fn pause(&self, id: &str, expected: ExpectedVersion) -> Result<Subscription, StoreError> {
        self.mutate(id, expected, Transition::Pause).await
    }

    #[instrument(skip(self), fields(operation = "unpause", version = field::Empty), err)]
    async fn unpause(
        &self,
        id: &str,
        expected: ExpectedVersion,
    ) -> Result<Subscription, StoreError> {
        self.mutate(id, expected, Transition::Unpause).await
    }

    #[instrument(skip(self), fields(operation = "cancel", version = field::Empty), err)]
    async fn cancel(
        &self,
        id: &str,
        expected: ExpectedVersion,
    ) -> Result<Subscription, StoreError> {
        self.mutate(id, expected, Transition::Cancel).await
    }
}

/// Roll back and hand back the error that caused it.
async fn abort(tx: Transaction<'_, Postgres>, err: StoreError) -> StoreError {
    if let Err(rollback_err) = tx.rollback().await {
        warn!(error = %rollback_err, "rollback failed");
    }
    err
}

/// Load a row and hold its lock until the transaction ends.
async fn lock_row(
    tx: &mut Transaction<'_, Postgres>,
    id: SubscriptionId,
) -> Result<Option<Subscription>, StoreError> {
    let row = sqlx::query(
        r#"
        SELECT
            id, user_id, product_id, start_date, end_date, status,
            version, paused_at, cancelled_at, created_at, updated_at
        FROM subscriptions
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("lock_subscription", e))?;

    row.as_ref().map(decode).transpose()
}

/// Persist `next` over the locked row, which must still be at `locked_version`.
async fn write_row(
    tx: &mut Transaction<'_, Postgres>,
    next: &Subscription,
    locked_version: Version,
) -> Result<Subscription, StoreError> {
    let row = sqlx::query(
        r#"
        UPDATE subscriptions
        SET
            end_date = $3,
            status = $4,
            version = $5,
            paused_at = $6,
            cancelled_at = $7,
            updated_at = $8
        WHERE id = $1 AND version = $2
        RETURNING
            id, user_id, product_id, start_date, end_date, status,
            version, paused_at, cancelled_at, created_at, updated_at
        "#,
    )
    .bind(next.id.as_uuid())
    .bind(locked_version.get() as i64)
    .bind(next.end_date)
    .bind(next.status.as_str())
    .bind(next.version.get() as i64)
    .bind(next.paused_at)
    .bind(next.cancelled_at)
    .bind(next.updated_at)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("update_subscription", e))?;

    match row {
        Some(row) => decode(&row),
        None => Err(StoreError::Consistency(format!(
            "subscription {} changed under row lock (expected version {})",
            next.id, locked_version
        ))),
    }
}

fn decode(row: &sqlx::postgres::PgRow) -> Result<Subscription, StoreError> {
    let raw = <SubscriptionRow as sqlx::FromRow<'_, sqlx::postgres::PgRow>>::from_row(row)
        .map_err(|e| StoreError::Consistency(format!("failed to decode subscription row: {}", e)))?;
    Subscription::try_from(raw)
}

// SQLx row types

#[derive(Debug)]
struct SubscriptionRow {
    id: uuid::Uuid,
    user_id: uuid::Uuid,
    product_id: uuid::Uuid,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    status: String,
    version: i64,
    paused_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for SubscriptionRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(SubscriptionRow {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            product_id: row.try_get("product_id")?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            status: row.try_get("status")?,
            version: row.try_get("version")?,
            paused_at: row.try_get("paused_at")?,
            cancelled_at: row.try_get("cancelled_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = StoreError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let status: SubscriptionStatus = row
            .status
            .parse()
            .map_err(|e: tenure_subscriptions::UnknownStatus| StoreError::Consistency(e.to_string()))?;
        let version = Version::try_from(row.version).map_err(|e| {
            StoreError::Consistency(format!("subscription {}: {}", row.id, e))
        })?;

        Ok(Subscription {
            id: SubscriptionId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            product_id: ProductId::from_uuid(row.product_id),
            start_date: row.start_date,
            end_date: row.end_date,
            status,
            paused_at: row.paused_at,
            cancelled_at: row.cancelled_at,
            version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
