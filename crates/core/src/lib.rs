//! `tenure-core`: shared building blocks for the subscription service.
//!
//! This crate contains **pure** primitives (no infrastructure concerns):
//! identifiers, the version counter used for optimistic concurrency, the
//! domain error model and the clock abstraction.

pub mod clock;
pub mod error;
pub mod id;
pub mod version;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DomainError, DomainResult};
pub use id::{ProductId, SubscriptionId, UserId};
pub use version::{ExpectedVersion, Version, VersionParseError};
