//! Infrastructure layer: subscription and catalog storage, the concurrency
//! guard, and Postgres bootstrapping.

pub mod catalog;
pub mod db;
pub mod error;
pub mod guard;
pub mod subscription_store;

pub use catalog::{InMemoryProductCatalog, PostgresProductCatalog, ProductCatalog};
pub use error::{CatalogError, StoreError};
pub use guard::ConcurrencyGuard;
pub use subscription_store::{
    InMemorySubscriptionStore, PostgresSubscriptionStore, SubscriptionStore,
};
