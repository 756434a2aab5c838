//! Storage wiring: picks the in-memory or Postgres variants of the stores.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use tenure_infra::db;
use tenure_infra::{
    CatalogError, InMemoryProductCatalog, InMemorySubscriptionStore, PostgresProductCatalog,
    PostgresSubscriptionStore, ProductCatalog, StoreError, SubscriptionStore,
};
use tenure_subscriptions::ExpiryPolicy;

use crate::config::{ApiConfig, StorageBackend};

/// Stores shared by every handler.
#[derive(Clone)]
pub struct AppServices {
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub catalog: Arc<dyn ProductCatalog>,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("DATABASE_URL must be configured for the postgres backend")]
    MissingDatabase,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl AppServices {
    /// In-memory stores with the default catalog (dev/test).
    pub fn in_memory(policy: ExpiryPolicy) -> Self {
        Self {
            subscriptions: Arc::new(InMemorySubscriptionStore::new().with_policy(policy)),
            catalog: Arc::new(InMemoryProductCatalog::seeded()),
        }
    }

    pub fn postgres(pool: sqlx::PgPool, policy: ExpiryPolicy) -> Self {
        Self {
            subscriptions: Arc::new(PostgresSubscriptionStore::new(pool.clone()).with_policy(policy)),
            catalog: Arc::new(PostgresProductCatalog::new(pool)),
        }
    }
}

pub async fn build_services(config: &ApiConfig) -> Result<AppServices, ServiceError> {
    match config.backend {
        StorageBackend::Memory => {
            info!(policy = ?config.expiry_policy, "using in-memory stores");
            Ok(AppServices::in_memory(config.expiry_policy))
        }
        StorageBackend::Postgres => {
            let database = config
                .database
                .as_ref()
                .ok_or(ServiceError::MissingDatabase)?;

            let pool = db::connect(database).await?;
            if database.auto_migrate {
                db::migrate(&pool).await?;
            }
            if database.seed {
                db::seed_default_products(&pool).await?;
            }

            info!(policy = ?config.expiry_policy, "using postgres stores");
            Ok(AppServices::postgres(pool, config.expiry_policy))
        }
    }
}
