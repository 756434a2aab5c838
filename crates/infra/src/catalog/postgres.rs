use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{Span, instrument};

use tenure_catalog::{Page, PageRequest, Product, SubscriptionDuration};
use tenure_core::ProductId;

use super::{ProductCatalog, parse_product_id};
use crate::error::{CatalogError, map_catalog_sqlx_error};

/// Postgres-backed product catalog (read-only; rows are seeded by
/// [`crate::db::seed_products`]).
#[derive(Debug, Clone)]
pub struct PostgresProductCatalog {
    pool: PgPool,
}

impl PostgresProductCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductCatalog for PostgresProductCatalog {
    #[instrument(skip(self), err)]
    async fn get_product(&self, id: &str) -> Result<Product, CatalogError> {
        let id = parse_product_id(id)?;

        let row = sqlx::query(
            r#"
            SELECT id, name, description, price, tax_rate_bps, duration_days, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_catalog_sqlx_error("get_product", e))?;

        match row {
            Some(row) => decode(&row),
            None => Err(CatalogError::NotFound),
        }
    }

    #[instrument(skip(self), fields(returned = tracing::field::Empty), err)]
    async fn list_products(&self, request: PageRequest) -> Result<Page<Product>, CatalogError> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM products")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_catalog_sqlx_error("count_products", e))?
            .try_get("total")
            .map_err(|e| map_catalog_sqlx_error("count_products", e))?;

        let rows = sqlx::query(
            r#"
            SELECT id, name, description, price, tax_rate_bps, duration_days, created_at, updated_at
            FROM products
            ORDER BY created_at ASC, duration_days ASC, id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(i64::from(request.limit()))
        .bind(request.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_catalog_sqlx_error("list_products", e))?;

        let items = rows.iter().map(decode).collect::<Result<Vec<_>, _>>()?;
        Span::current().record("returned", items.len());
        Ok(Page::new(items, total.max(0) as u64, request))
    }
}

fn decode(row: &sqlx::postgres::PgRow) -> Result<Product, CatalogError> {
    let raw = <ProductRow as sqlx::FromRow<'_, sqlx::postgres::PgRow>>::from_row(row)
        .map_err(|e| CatalogError::Database(format!("failed to decode product row: {}", e)))?;
    Product::try_from(raw)
}

#[derive(Debug)]
struct ProductRow {
    id: uuid::Uuid,
    name: String,
    description: Option<String>,
    price: i64,
    tax_rate_bps: i32,
    duration_days: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ProductRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: row.try_get("price")?,
            tax_rate_bps: row.try_get("tax_rate_bps")?,
            duration_days: row.try_get("duration_days")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<ProductRow> for Product {
    type Error = CatalogError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let price = u64::try_from(row.price)
            .map_err(|_| CatalogError::InvalidProduct(format!("negative price on {}", row.id)))?;
        let tax_rate_bps = u32::try_from(row.tax_rate_bps)
            .map_err(|_| CatalogError::InvalidProduct(format!("negative tax rate on {}", row.id)))?;

        Ok(Product {
            id: ProductId::from_uuid(row.id),
            name: row.name,
            description: row.description,
            price,
            tax_rate_bps,
            duration: SubscriptionDuration::from_days(row.duration_days),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
