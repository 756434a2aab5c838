//! Postgres bootstrap: pool construction, schema creation and catalog seeding.

mod config;

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, instrument};

use tenure_catalog::{Product, default_products};

pub use config::DatabaseConfig;

use crate::error::{CatalogError, StoreError, map_catalog_sqlx_error, map_sqlx_error};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

/// Open a connection pool.
#[instrument(skip(config), fields(max_connections = config.max_connections), err)]
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, StoreError> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))
}

/// Create tables and indexes. Idempotent.
#[instrument(skip(pool), err)]
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("migrate", e))?;
    info!("schema ready");
    Ok(())
}

/// Insert the default products if the catalog is empty.
///
/// Returns the number of rows inserted.
#[instrument(skip(pool), err)]
pub async fn seed_default_products(pool: &PgPool) -> Result<u64, CatalogError> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(pool)
        .await
        .map_err(|e| map_catalog_sqlx_error("count_products", e))?;
    if existing > 0 {
        return Ok(0);
    }
    seed_products(pool, &default_products(Utc::now())).await
}

/// Insert products, leaving rows that already exist untouched.
pub async fn seed_products(pool: &PgPool, products: &[Product]) -> Result<u64, CatalogError> {
    let mut inserted = 0;
    for product in products {
        product.validate()?;

        let result = sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description, price, tax_rate_bps, duration_days, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price as i64)
        .bind(product.tax_rate_bps as i32)
        .bind(product.duration.days())
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(pool)
        .await
        .map_err(|e| map_catalog_sqlx_error("seed_products", e))?;

        inserted += result.rows_affected();
    }

    if inserted > 0 {
        info!(inserted, "catalog seeded");
    }
    Ok(inserted)
}
