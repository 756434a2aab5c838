//! Lifecycle decisions.
//!
//! Each `decide_*` function takes a snapshot and `now` and returns either the
//! next snapshot or the reason the operation is illegal. The functions never
//! mutate their input and never touch `version`; the result carries the input
//! version unchanged and the caller assigns the next one on commit.
//!
//! ```text
//!            pause              cancel
//!   Active ─────────▶ Paused ─────────▶ Cancelled (terminal)
//!     ▲  ◀─────────     │
//!     │    unpause      │ end_date < now (lazy, on read)
//!     │                 ▼
//!     └──────────────▶ Expired ──cancel──▶ Cancelled
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tenure_catalog::Product;
use tenure_core::{SubscriptionId, UserId, Version};

use crate::subscription::{Subscription, SubscriptionStatus};

/// Why a lifecycle operation was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("product reference required")]
    ProductRequired,

    #[error("product duration out of range (got {0} days)")]
    InvalidProductDuration(i32),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("subscription cannot be paused while {0}")]
    CannotPause(SubscriptionStatus),

    #[error("subscription cannot be unpaused while {0}")]
    CannotUnpause(SubscriptionStatus),

    #[error("subscription is already cancelled")]
    CannotCancel,

    /// The snapshot itself is malformed (a defect, not a caller error).
    #[error("inconsistent subscription state: {0}")]
    Inconsistent(String),
}

/// Whether a paused subscription's clock keeps running towards expiry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryPolicy {
    /// Any non-cancelled, non-expired subscription past its end date expires.
    #[default]
    IncludePaused,
    /// Pausing freezes the clock; only active subscriptions expire.
    ExemptPaused,
}

impl ExpiryPolicy {
    fn applies_to(self, status: SubscriptionStatus) -> bool {
        match status {
            SubscriptionStatus::Active => true,
            SubscriptionStatus::Paused => self == ExpiryPolicy::IncludePaused,
            SubscriptionStatus::Cancelled | SubscriptionStatus::Expired => false,
        }
    }
}

/// Build a brand-new subscription for `user_id` on `product`.
///
/// Preconditions are checked in order: product present, duration in range,
/// user id well-formed.
pub fn decide_create(
    user_id: &str,
    product: Option<&Product>,
    now: DateTime<Utc>,
) -> Result<Subscription, LifecycleError> {
    let product = product.ok_or(LifecycleError::ProductRequired)?;
    if !product.duration.is_valid() {
        return Err(LifecycleError::InvalidProductDuration(product.duration.days()));
    }
    let user_id: UserId = user_id
        .parse()
        .map_err(|e: tenure_core::DomainError| LifecycleError::InvalidIdentifier(e.to_string()))?;
    let end_date = now
        .checked_add_signed(product.duration.to_chrono())
        .ok_or(LifecycleError::InvalidProductDuration(product.duration.days()))?;

    Ok(Subscription {
        id: SubscriptionId::new(),
        user_id,
        product_id: product.id,
        start_date: now,
        end_date,
        status: SubscriptionStatus::Active,
        paused_at: None,
        cancelled_at: None,
        version: Version::INITIAL,
        created_at: now,
        updated_at: now,
    })
}

pub fn decide_pause(
    snapshot: &Subscription,
    now: DateTime<Utc>,
) -> Result<Subscription, LifecycleError> {
    if snapshot.status != SubscriptionStatus::Active {
        return Err(LifecycleError::CannotPause(snapshot.status));
    }

    let mut next = snapshot.clone();
    next.status = SubscriptionStatus::Paused;
    next.paused_at = Some(now);
    next.updated_at = now;
    Ok(next)
}

/// Resume a paused subscription, shifting `end_date` by the time spent paused.
pub fn decide_unpause(
    snapshot: &Subscription,
    now: DateTime<Utc>,
) -> Result<Subscription, LifecycleError> {
    if snapshot.status != SubscriptionStatus::Paused {
        return Err(LifecycleError::CannotUnpause(snapshot.status));
    }
    let paused_at = snapshot.paused_at.ok_or_else(|| {
        LifecycleError::Inconsistent("paused subscription missing paused_at".to_string())
    })?;

    // Clamped so a pause recorded after end_date cannot move end_date before now.
    let remaining = (snapshot.end_date - paused_at).max(Duration::zero());

    let end_date = now.checked_add_signed(remaining).ok_or_else(|| {
        LifecycleError::Inconsistent("end_date out of range after unpause".to_string())
    })?;

    let mut next = snapshot.clone();
    next.status = SubscriptionStatus::Active;
    next.end_date = end_date;
    next.paused_at = None;
    next.updated_at = now;
    Ok(next)
}

pub fn decide_cancel(
    snapshot: &Subscription,
    now: DateTime<Utc>,
) -> Result<Subscription, LifecycleError> {
    if snapshot.status == SubscriptionStatus::Cancelled {
        return Err(LifecycleError::CannotCancel);
    }

    let mut next = snapshot.clone();
    next.status = SubscriptionStatus::Cancelled;
    next.cancelled_at = Some(now);
    next.paused_at = None;
    next.updated_at = now;
    Ok(next)
}

/// Lazy expiry. `None` means nothing changes (and nothing must be written).
pub fn decide_expiry(
    snapshot: &Subscription,
    now: DateTime<Utc>,
    policy: ExpiryPolicy,
) -> Option<Subscription> {
    if snapshot.end_date >= now || !policy.applies_to(snapshot.status) {
        return None;
    }

    let mut next = snapshot.clone();
    next.status = SubscriptionStatus::Expired;
    next.paused_at = None;
    next.updated_at = now;
    Some(next)
}

/// The snapshot as every caller must observe it at `now`: expired if its
/// window has lapsed, unchanged otherwise.
pub fn effective_snapshot(
    snapshot: &Subscription,
    now: DateTime<Utc>,
    policy: ExpiryPolicy,
) -> Subscription {
    decide_expiry(snapshot, now, policy).unwrap_or_else(|| snapshot.clone())
}

/// A caller-requested, version-guarded state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Pause,
    Unpause,
    Cancel,
}

impl Transition {
    pub fn decide(
        self,
        snapshot: &Subscription,
        now: DateTime<Utc>,
    ) -> Result<Subscription, LifecycleError> {
        match self {
            Transition::Pause => decide_pause(snapshot, now),
            Transition::Unpause => decide_unpause(snapshot, now),
            Transition::Cancel => decide_cancel(snapshot, now),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Transition::Pause => "pause",
            Transition::Unpause => "unpause",
            Transition::Cancel => "cancel",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tenure_catalog::SubscriptionDuration;
    use tenure_core::ProductId;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn product(days: i32) -> Product {
        Product::new(
            ProductId::new(),
            "Monthly Plan",
            999,
            SubscriptionDuration::from_days(days),
            t0(),
        )
    }

    fn user() -> String {
        UserId::new().to_string()
    }

    fn created(days: i32) -> Subscription {
        decide_create(&user(), Some(&product(days)), t0()).unwrap()
    }

    #[test]
    fn create_starts_active_at_version_one() {
        let p = product(30);
        let sub = decide_create(&user(), Some(&p), t0()).unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.version, Version::INITIAL);
        assert_eq!(sub.product_id, p.id);
        assert_eq!(sub.start_date, t0());
        assert_eq!(sub.end_date, t0() + Duration::days(30));
        assert_eq!(sub.created_at, t0());
        assert_eq!(sub.updated_at, t0());
        assert_eq!(sub.paused_at, None);
        assert_eq!(sub.cancelled_at, None);
    }

    #[test]
    fn create_requires_product() {
        assert_eq!(
            decide_create(&user(), None, t0()),
            Err(LifecycleError::ProductRequired)
        );
    }

    #[test]
    fn create_rejects_non_positive_duration() {
        assert_eq!(
            decide_create(&user(), Some(&product(0)), t0()),
            Err(LifecycleError::InvalidProductDuration(0))
        );
        assert_eq!(
            decide_create(&user(), Some(&product(-1)), t0()),
            Err(LifecycleError::InvalidProductDuration(-1))
        );
    }

    #[test]
    fn create_rejects_oversized_duration() {
        assert_eq!(
            decide_create(&user(), Some(&product(i32::MAX)), t0()),
            Err(LifecycleError::InvalidProductDuration(i32::MAX))
        );
    }

    #[test]
    fn create_rejects_end_date_past_calendar_range() {
        let near_max = DateTime::<Utc>::MAX_UTC - Duration::days(10);
        assert_eq!(
            decide_create(&user(), Some(&product(30)), near_max),
            Err(LifecycleError::InvalidProductDuration(30))
        );
    }

    #[test]
    fn create_rejects_malformed_user_id() {
        let err = decide_create("not-a-uuid", Some(&product(30)), t0()).unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidIdentifier(_)));
    }

    #[test]
    fn product_checks_take_precedence_over_user_id() {
        assert_eq!(
            decide_create("garbage", None, t0()),
            Err(LifecycleError::ProductRequired)
        );
        assert_eq!(
            decide_create("garbage", Some(&product(0)), t0()),
            Err(LifecycleError::InvalidProductDuration(0))
        );
    }

    #[test]
    fn pause_only_from_active() {
        let sub = created(30);
        let t1 = t0() + Duration::days(5);
        let paused = decide_pause(&sub, t1).unwrap();
        assert_eq!(paused.status, SubscriptionStatus::Paused);
        assert_eq!(paused.paused_at, Some(t1));
        assert_eq!(paused.updated_at, t1);
        assert_eq!(paused.end_date, sub.end_date);

        assert_eq!(
            decide_pause(&paused, t1),
            Err(LifecycleError::CannotPause(SubscriptionStatus::Paused))
        );

        let cancelled = decide_cancel(&sub, t1).unwrap();
        assert_eq!(
            decide_pause(&cancelled, t1),
            Err(LifecycleError::CannotPause(SubscriptionStatus::Cancelled))
        );
    }

    #[test]
    fn decisions_do_not_touch_version() {
        let mut sub = created(30);
        sub.version = Version::new(7).unwrap();
        let paused = decide_pause(&sub, t0()).unwrap();
        assert_eq!(paused.version, sub.version);
    }

    #[test]
    fn unpause_extends_end_date_by_pause_length() {
        let sub = created(30);
        let t1 = t0() + Duration::days(10);
        let t2 = t1 + Duration::days(4);

        let paused = decide_pause(&sub, t1).unwrap();
        let resumed = decide_unpause(&paused, t2).unwrap();

        assert_eq!(resumed.status, SubscriptionStatus::Active);
        assert_eq!(resumed.paused_at, None);
        assert_eq!(resumed.updated_at, t2);
        assert_eq!(resumed.end_date, t2 + (sub.end_date - t1));
        assert_eq!(resumed.end_date, sub.end_date + Duration::days(4));
    }

    #[test]
    fn unpause_only_from_paused() {
        let sub = created(30);
        assert_eq!(
            decide_unpause(&sub, t0()),
            Err(LifecycleError::CannotUnpause(SubscriptionStatus::Active))
        );
    }

    #[test]
    fn unpause_without_paused_at_is_a_consistency_fault() {
        let mut sub = created(30);
        sub.status = SubscriptionStatus::Paused;
        let err = decide_unpause(&sub, t0()).unwrap_err();
        assert!(matches!(err, LifecycleError::Inconsistent(_)));
    }

    #[test]
    fn unpause_clamps_negative_remaining_time() {
        let mut sub = created(30);
        sub.status = SubscriptionStatus::Paused;
        sub.paused_at = Some(sub.end_date + Duration::days(1));
        let now = t0() + Duration::days(40);
        let resumed = decide_unpause(&sub, now).unwrap();
        assert_eq!(resumed.end_date, now);
        assert!(resumed.end_date >= resumed.start_date);
    }

    #[test]
    fn cancel_from_every_status_but_cancelled() {
        let t1 = t0() + Duration::days(1);
        let active = created(30);
        let paused = decide_pause(&active, t1).unwrap();
        let expired = decide_expiry(&active, t0() + Duration::days(31), ExpiryPolicy::default())
            .unwrap();

        for snapshot in [&active, &paused, &expired] {
            let cancelled = decide_cancel(snapshot, t1).unwrap();
            assert_eq!(cancelled.status, SubscriptionStatus::Cancelled);
            assert_eq!(cancelled.cancelled_at, Some(t1));
            assert_eq!(cancelled.paused_at, None);
            assert_eq!(cancelled.invariant_violation(), None);
        }

        let cancelled = decide_cancel(&active, t1).unwrap();
        assert_eq!(decide_cancel(&cancelled, t1), Err(LifecycleError::CannotCancel));
    }

    #[test]
    fn expiry_is_noop_before_end_date() {
        let sub = created(30);
        assert_eq!(decide_expiry(&sub, sub.end_date, ExpiryPolicy::default()), None);
        assert_eq!(
            decide_expiry(&sub, t0() + Duration::days(1), ExpiryPolicy::default()),
            None
        );
    }

    #[test]
    fn expiry_marks_lapsed_active_subscription() {
        let sub = created(30);
        let later = sub.end_date + Duration::seconds(1);
        let expired = decide_expiry(&sub, later, ExpiryPolicy::default()).unwrap();
        assert_eq!(expired.status, SubscriptionStatus::Expired);
        assert_eq!(expired.updated_at, later);
        assert_eq!(expired.end_date, sub.end_date);
        assert_eq!(expired.version, sub.version);
    }

    #[test]
    fn cancelled_and_expired_never_expire_again() {
        let sub = created(30);
        let later = sub.end_date + Duration::days(1);
        let cancelled = decide_cancel(&sub, t0()).unwrap();
        assert_eq!(decide_expiry(&cancelled, later, ExpiryPolicy::default()), None);

        let expired = decide_expiry(&sub, later, ExpiryPolicy::default()).unwrap();
        assert_eq!(decide_expiry(&expired, later, ExpiryPolicy::default()), None);
    }

    #[test]
    fn paused_expiry_depends_on_policy() {
        let sub = created(30);
        let paused = decide_pause(&sub, t0() + Duration::days(1)).unwrap();
        let later = sub.end_date + Duration::days(1);

        let expired = decide_expiry(&paused, later, ExpiryPolicy::IncludePaused).unwrap();
        assert_eq!(expired.status, SubscriptionStatus::Expired);
        assert_eq!(expired.paused_at, None);
        assert_eq!(expired.invariant_violation(), None);

        assert_eq!(decide_expiry(&paused, later, ExpiryPolicy::ExemptPaused), None);
    }

    #[test]
    fn effective_snapshot_hides_lapsed_status() {
        let sub = created(30);
        let later = sub.end_date + Duration::days(1);
        let effective = effective_snapshot(&sub, later, ExpiryPolicy::default());
        assert_eq!(effective.status, SubscriptionStatus::Expired);
        assert_eq!(
            Transition::Pause.decide(&effective, later),
            Err(LifecycleError::CannotPause(SubscriptionStatus::Expired))
        );
    }

    #[test]
    fn transition_dispatches_to_decisions() {
        let sub = created(30);
        let paused = Transition::Pause.decide(&sub, t0()).unwrap();
        assert_eq!(paused.status, SubscriptionStatus::Paused);
        let resumed = Transition::Unpause.decide(&paused, t0()).unwrap();
        assert_eq!(resumed.status, SubscriptionStatus::Active);
        let cancelled = Transition::Cancel.decide(&resumed, t0()).unwrap();
        assert_eq!(cancelled.status, SubscriptionStatus::Cancelled);
        assert_eq!(Transition::Unpause.name(), "unpause");
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone, Copy)]
        enum Op {
            Pause,
            Unpause,
            Cancel,
            Read,
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                Just(Op::Pause),
                Just(Op::Unpause),
                Just(Op::Cancel),
                Just(Op::Read),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: unpausing at `u` yields `u + (end_date - paused_at)`.
            #[test]
            fn unpause_preserves_remaining_time(
                days in 1i32..36_500,
                pause_after_secs in 0i64..(30 * 86_400),
                paused_for_secs in 0i64..(400 * 86_400),
            ) {
                let sub = created(days);
                let paused_at = t0() + Duration::seconds(pause_after_secs);
                prop_assume!(paused_at <= sub.end_date);
                let u = paused_at + Duration::seconds(paused_for_secs);

                let paused = decide_pause(&sub, paused_at).unwrap();
                let resumed = decide_unpause(&paused, u).unwrap();

                prop_assert_eq!(resumed.end_date, u + (sub.end_date - paused_at));
                prop_assert!(resumed.end_date >= resumed.start_date);
            }

            /// Property: any sequence of decisions keeps snapshots structurally
            /// consistent, and cancellation is terminal.
            #[test]
            fn decisions_preserve_invariants(
                ops in proptest::collection::vec((op(), 0i64..(20 * 86_400)), 1..40),
                policy in prop_oneof![Just(ExpiryPolicy::IncludePaused), Just(ExpiryPolicy::ExemptPaused)],
            ) {
                let mut now = t0();
                let mut sub = created(30);
                let mut was_cancelled = false;

                for (op, step) in ops {
                    now += Duration::seconds(step);
                    let current = effective_snapshot(&sub, now, policy);
                    let outcome = match op {
                        Op::Pause => Transition::Pause.decide(&current, now).ok(),
                        Op::Unpause => Transition::Unpause.decide(&current, now).ok(),
                        Op::Cancel => Transition::Cancel.decide(&current, now).ok(),
                        Op::Read => Some(current.clone()),
                    };
                    if let Some(next) = outcome {
                        sub = next;
                    }

                    prop_assert_eq!(sub.invariant_violation(), None);
                    if was_cancelled {
                        prop_assert_eq!(sub.status, SubscriptionStatus::Cancelled);
                    }
                    was_cancelled |= sub.is_cancelled();
                }
            }

            /// Property: decisions are deterministic and leave their input untouched.
            #[test]
            fn decide_is_pure(offset_secs in 0i64..(60 * 86_400)) {
                let sub = created(30);
                let before = sub.clone();
                let now = t0() + Duration::seconds(offset_secs);

                let a = Transition::Pause.decide(&sub, now);
                let b = Transition::Pause.decide(&sub, now);

                prop_assert_eq!(&sub, &before);
                prop_assert_eq!(a, b);
            }
        }
    }
}
