//! Permission guards over a membership value.

use super::{Denial, Membership, ReconcileError, SubsStatus, Tier};

/// Decides whether a new Stripe subscription may be created for `m`.
///
/// Allowed when there is no membership, a one-time purchase has expired,
/// a non-renewing Stripe membership has expired, or Stripe reports the
/// subscription as finished.
pub fn permit_stripe_create(m: &Membership) -> Result<(), ReconcileError> {
    if m.is_zero() {
        return Ok(());
    }

    let expired = m.is_expired();

    if m.is_ali_or_wx() && expired {
        return Ok(());
    }

    if m.is_stripe() {
        if expired && !m.auto_renewal {
            return Ok(());
        }
        if m.status.is_some_and(|s| s.should_create()) {
            return Ok(());
        }
        return Err(Denial::ActiveStripeSub.into());
    }

    if !expired {
        return Err(Denial::NonStripeValidSub.into());
    }

    Err(ReconcileError::unknown_state(format!(
        "cannot decide stripe create for {} paid via {}",
        m.compound_id(),
        m.payment_method.map(|p| p.as_str()).unwrap_or("unknown"),
    )))
}

/// True only for a valid, active, standard-tier Stripe membership.
pub fn permit_stripe_upgrade(m: &Membership) -> bool {
    !m.is_zero()
        && !m.is_expired()
        && m.is_stripe()
        && m.status == Some(SubsStatus::Active)
        && m.tier() == Some(Tier::Standard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserIds;
    use crate::domain::membership::{today, Edition, PayMethod};
    use chrono::Duration;
    use proptest::prelude::*;

    fn member(method: Option<PayMethod>, days_left: i64) -> Membership {
        Membership {
            user_ids: UserIds::ftc("ftc-1"),
            edition: Some(Edition::STANDARD_YEAR),
            expire_date: Some(today() + Duration::days(days_left)),
            payment_method: method,
            ..Default::default()
        }
        .sync_legacy()
    }

    fn stripe(days_left: i64, auto_renewal: bool, status: SubsStatus) -> Membership {
        Membership {
            stripe_subs_id: Some("sub_1".into()),
            auto_renewal,
            status: Some(status),
            ..member(Some(PayMethod::Stripe), days_left)
        }
    }

    #[test]
    fn zero_membership_may_create() {
        assert!(permit_stripe_create(&Membership::default()).is_ok());
    }

    #[test]
    fn expired_alipay_may_create() {
        assert!(permit_stripe_create(&member(Some(PayMethod::Alipay), -1)).is_ok());
    }

    #[test]
    fn valid_wxpay_is_denied_as_non_stripe() {
        let err = permit_stripe_create(&member(Some(PayMethod::Wxpay), 30)).unwrap_err();
        assert_eq!(err, ReconcileError::Denied(Denial::NonStripeValidSub));
    }

    #[test]
    fn valid_apple_is_denied_as_non_stripe() {
        let err = permit_stripe_create(&member(Some(PayMethod::Apple), 30)).unwrap_err();
        assert_eq!(err.denial(), Some(Denial::NonStripeValidSub));
    }

    #[test]
    fn expired_non_renewing_stripe_may_create() {
        assert!(permit_stripe_create(&stripe(-2, false, SubsStatus::Active)).is_ok());
    }

    #[test]
    fn canceled_stripe_may_create_even_if_not_expired() {
        assert!(permit_stripe_create(&stripe(10, true, SubsStatus::Canceled)).is_ok());
        assert!(permit_stripe_create(&stripe(10, true, SubsStatus::IncompleteExpired)).is_ok());
    }

    #[test]
    fn active_stripe_is_denied() {
        let err = permit_stripe_create(&stripe(10, true, SubsStatus::Active)).unwrap_err();
        assert_eq!(err.denial(), Some(Denial::ActiveStripeSub));
    }

    #[test]
    fn expired_auto_renewing_past_due_is_denied() {
        let err = permit_stripe_create(&stripe(-1, true, SubsStatus::PastDue)).unwrap_err();
        assert_eq!(err.denial(), Some(Denial::ActiveStripeSub));
    }

    #[test]
    fn expired_apple_is_unknown_state() {
        let err = permit_stripe_create(&member(Some(PayMethod::Apple), -5)).unwrap_err();
        assert!(matches!(err, ReconcileError::UnknownState(_)));
    }

    #[test]
    fn upgrade_requires_active_standard_stripe() {
        assert!(permit_stripe_upgrade(&stripe(30, true, SubsStatus::Active)));
        assert!(!permit_stripe_upgrade(&stripe(30, true, SubsStatus::PastDue)));
        assert!(!permit_stripe_upgrade(&stripe(-1, true, SubsStatus::Active)));
        assert!(!permit_stripe_upgrade(&member(Some(PayMethod::Alipay), 30)));

        let premium = Membership {
            edition: Some(Edition::PREMIUM_YEAR),
            ..stripe(30, true, SubsStatus::Active)
        };
        assert!(!permit_stripe_upgrade(&premium));
    }

    fn arb_method() -> impl Strategy<Value = Option<PayMethod>> {
        prop_oneof![
            Just(None),
            Just(Some(PayMethod::Alipay)),
            Just(Some(PayMethod::Wxpay)),
            Just(Some(PayMethod::Stripe)),
            Just(Some(PayMethod::Apple)),
            Just(Some(PayMethod::B2b)),
        ]
    }

    fn arb_status() -> impl Strategy<Value = Option<SubsStatus>> {
        prop_oneof![
            Just(None),
            Just(Some(SubsStatus::Incomplete)),
            Just(Some(SubsStatus::IncompleteExpired)),
            Just(Some(SubsStatus::Trialing)),
            Just(Some(SubsStatus::Active)),
            Just(Some(SubsStatus::PastDue)),
            Just(Some(SubsStatus::Canceled)),
            Just(Some(SubsStatus::Unpaid)),
            Just(Some(SubsStatus::Paused)),
        ]
    }

    fn arb_membership() -> impl Strategy<Value = Membership> {
        (
            any::<bool>(),
            arb_method(),
            -400i64..400,
            any::<bool>(),
            arb_status(),
        )
            .prop_map(|(zero, method, days, auto_renewal, status)| {
                if zero {
                    return Membership::default();
                }
                Membership {
                    auto_renewal,
                    status,
                    ..member(method, days)
                }
            })
    }

    proptest! {
        #[test]
        fn create_permitted_iff_rule_holds(m in arb_membership()) {
            let expected = m.is_zero()
                || (m.is_ali_or_wx() && m.is_expired())
                || (m.is_stripe() && m.is_expired() && !m.auto_renewal)
                || (m.is_stripe() && m.status.is_some_and(|s| s.should_create()));

            prop_assert_eq!(permit_stripe_create(&m).is_ok(), expected);
        }
    }
}
