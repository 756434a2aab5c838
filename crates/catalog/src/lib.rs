//! Product catalog model.
//!
//! Products are read-only inputs to the subscription lifecycle: the only thing
//! the lifecycle ever takes from a product is its duration. Everything here is
//! deterministic (no IO); storage lives in `tenure-infra`.

pub mod page;
pub mod product;
pub mod seed;

pub use page::{Page, PageRequest};
pub use product::{Product, SubscriptionDuration};
pub use seed::default_products;
