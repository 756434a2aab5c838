//! Subscription lifecycle (pure decision logic).
//!
//! This crate decides *what* a subscription looks like after an operation. It
//! performs no IO and never looks at version numbers; persisting a decision
//! and guarding it against concurrent writers is the store's job.

pub mod lifecycle;
pub mod subscription;

pub use lifecycle::{
    ExpiryPolicy, LifecycleError, Transition, decide_cancel, decide_create, decide_expiry,
    decide_pause, decide_unpause, effective_snapshot,
};
pub use subscription::{Subscription, SubscriptionStatus, UnknownStatus};
