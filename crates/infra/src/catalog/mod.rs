//! Product catalog lookups.

mod in_memory;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use tenure_catalog::{Page, PageRequest, Product};
use tenure_core::ProductId;

use crate::error::CatalogError;

pub use in_memory::InMemoryProductCatalog;
pub use postgres::PostgresProductCatalog;

/// Read access to purchasable products.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn get_product(&self, id: &str) -> Result<Product, CatalogError>;

    /// Products in catalog order (oldest first).
    async fn list_products(&self, request: PageRequest) -> Result<Page<Product>, CatalogError>;
}

#[async_trait]
impl<C> ProductCatalog for Arc<C>
where
    C: ProductCatalog + ?Sized,
{
    async fn get_product(&self, id: &str) -> Result<Product, CatalogError> {
        (**self).get_product(id).await
    }

    async fn list_products(&self, request: PageRequest) -> Result<Page<Product>, CatalogError> {
        (**self).list_products(request).await
    }
}

pub(crate) fn parse_product_id(raw: &str) -> Result<ProductId, CatalogError> {
    raw.parse::<ProductId>().map_err(CatalogError::from)
}
