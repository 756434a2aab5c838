//! Concurrency guard: the version-check-then-decide step of every write.
//!
//! Stores call the guard **while holding an exclusive lock on the row** (a
//! `SELECT ... FOR UPDATE` inside a transaction for Postgres, the map's write
//! lock for the in-memory store). The guard itself never locks; it decides,
//! given the locked snapshot, what the committed row must look like.
//!
//! ```text
//! lock row ─▶ load ─▶ version == expected? ──no──▶ ConcurrentModification (abort)
//!                         │ yes
//!                         ▼
//!               apply lazy expiry in memory
//!                         ▼
//!               lifecycle decision ──illegal──▶ CannotPause / ... (abort)
//!                         ▼
//!               version = expected + 1 ─▶ persist ─▶ commit
//! ```
//!
//! The version check runs before transition legality, so a caller holding a
//! stale version always sees `ConcurrentModification`, never the transition
//! error the current state would produce.

use chrono::{DateTime, Utc};
use tracing::warn;

use tenure_core::ExpectedVersion;
use tenure_subscriptions::{
    ExpiryPolicy, Subscription, Transition, decide_expiry, effective_snapshot,
};

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, Default)]
pub struct ConcurrencyGuard {
    policy: ExpiryPolicy,
}

impl ConcurrencyGuard {
    pub fn new(policy: ExpiryPolicy) -> Self {
        Self { policy }
    }

    /// Decide a caller-requested transition against a locked snapshot.
    ///
    /// The returned snapshot carries `version = expected + 1` and is exactly
    /// what must be written before commit.
    pub fn apply(
        &self,
        locked: &Subscription,
        expected: ExpectedVersion,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<Subscription, StoreError> {
        if !expected.matches(locked.version) {
            warn!(
                subscription_id = %locked.id,
                expected = %expected,
                actual = %locked.version,
                transition = transition.name(),
                "stale version rejected"
            );
            return Err(StoreError::ConcurrentModification {
                expected: expected.version(),
                actual: locked.version,
            });
        }

        ensure_consistent(locked)?;

        let effective = effective_snapshot(locked, now, self.policy);
        let mut next = transition.decide(&effective, now)?;
        next.version = locked.version.next();
        Ok(next)
    }

    /// Lazy expiry for reads. `None` means the row is current and must not be
    /// written.
    pub fn refresh(
        &self,
        locked: &Subscription,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, StoreError> {
        ensure_consistent(locked)?;

        Ok(decide_expiry(locked, now, self.policy).map(|mut expired| {
            expired.version = locked.version.next();
            expired
        }))
    }
}

/// Reject snapshots that break structural invariants before deciding on them.
pub(crate) fn ensure_consistent(snapshot: &Subscription) -> Result<(), StoreError> {
    match snapshot.invariant_violation() {
        None => Ok(()),
        Some(violation) => {
            warn!(subscription_id = %snapshot.id, %violation, "inconsistent subscription row");
            Err(StoreError::Consistency(violation))
        }
    }
}
