use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use tenure_catalog::{Page, PageRequest, Product, default_products};

use super::{ProductCatalog, parse_product_id};
use crate::error::CatalogError;

/// In-memory product catalog.
///
/// Intended for tests/dev. Products are kept in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryProductCatalog {
    products: RwLock<Vec<Product>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog preloaded with the default plans.
    pub fn seeded() -> Self {
        Self {
            products: RwLock::new(default_products(Utc::now())),
        }
    }

    /// Add or replace a product after validating it.
    pub fn insert(&self, product: Product) -> Result<(), CatalogError> {
        product.validate()?;

        let mut products = self
            .products
            .write()
            .map_err(|_| CatalogError::Database("lock poisoned".to_string()))?;
        match products.iter_mut().find(|p| p.id == product.id) {
            Some(existing) => *existing = product,
            None => products.push(product),
        }
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn get_product(&self, id: &str) -> Result<Product, CatalogError> {
        let id = parse_product_id(id)?;
        let products = self
            .products
            .read()
            .map_err(|_| CatalogError::Database("lock poisoned".to_string()))?;

        products
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(CatalogError::NotFound)
    }

    async fn list_products(&self, request: PageRequest) -> Result<Page<Product>, CatalogError> {
        let products = self
            .products
            .read()
            .map_err(|_| CatalogError::Database("lock poisoned".to_string()))?;

        Ok(Page::new(
            request.apply(&products),
            products.len() as u64,
            request,
        ))
    }
}
