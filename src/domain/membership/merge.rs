//! Cross-channel merge of an FTC-side membership with an Apple-side one.

use super::{Denial, Membership, ReconcileError};

/// Decides whether the FTC-side membership `m` may take the identity held
/// by the Apple-side membership `iap`.
///
/// Rules, in order:
/// 1. Equal sides (both zero included) are returned unchanged.
/// 2. A non-zero Apple side bound elsewhere is refused.
/// 3. An expired `m` is returned so the caller can overwrite it.
/// 4. `m` bound to another Apple subscription is refused.
/// 5. A valid `m` from another channel is refused.
///
/// The function is pure; callers check zero-ness themselves to choose
/// between insert and update.
pub fn merge_iap_membership(
    m: &Membership,
    iap: &Membership,
) -> Result<Membership, ReconcileError> {
    if m == iap {
        return Ok(m.clone());
    }

    if !iap.is_zero() {
        return Err(Denial::LinkToMultipleFtc.into());
    }

    if m.is_expired() {
        return Ok(m.clone());
    }

    if m.is_iap_linked() {
        return Err(Denial::TargetLinkedToOtherIap.into());
    }

    Err(Denial::HasValidNonIapMember.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserIds;
    use crate::domain::membership::{today, Edition, PayMethod};
    use chrono::Duration;

    fn ftc_member(id: &str, method: PayMethod, days_left: i64) -> Membership {
        Membership {
            user_ids: UserIds::ftc(id),
            edition: Some(Edition::STANDARD_YEAR),
            expire_date: Some(today() + Duration::days(days_left)),
            payment_method: Some(method),
            ..Default::default()
        }
        .sync_legacy()
    }

    fn apple_member(id: &str, original_tx: &str, days_left: i64) -> Membership {
        Membership {
            apple_subs_id: Some(original_tx.into()),
            auto_renewal: true,
            ..ftc_member(id, PayMethod::Apple, days_left)
        }
    }

    #[test]
    fn both_zero_is_returned_unchanged() {
        let merged =
            merge_iap_membership(&Membership::default(), &Membership::default()).unwrap();
        assert!(merged.is_zero());
    }

    #[test]
    fn same_entitlement_is_returned_unchanged() {
        let m = apple_member("ftc-1", "1000", 30);
        assert_eq!(merge_iap_membership(&m, &m).unwrap(), m);
    }

    #[test]
    fn non_zero_iap_bound_elsewhere_is_fraud_signal() {
        let iap = apple_member("ftc-a", "1000", 30);

        let err = merge_iap_membership(&Membership::default(), &iap).unwrap_err();
        assert_eq!(err.denial(), Some(Denial::LinkToMultipleFtc));

        let other = ftc_member("ftc-b", PayMethod::Alipay, -10);
        let err = merge_iap_membership(&other, &iap).unwrap_err();
        assert_eq!(err.denial(), Some(Denial::LinkToMultipleFtc));
    }

    #[test]
    fn expired_ftc_member_may_be_overwritten() {
        let m = ftc_member("ftc-1", PayMethod::Wxpay, -1);
        assert_eq!(merge_iap_membership(&m, &Membership::default()).unwrap(), m);
    }

    #[test]
    fn valid_member_bound_to_other_iap_is_refused() {
        let m = apple_member("ftc-1", "2000", 30);
        let err = merge_iap_membership(&m, &Membership::default()).unwrap_err();
        assert_eq!(err.denial(), Some(Denial::TargetLinkedToOtherIap));
    }

    #[test]
    fn valid_non_iap_member_is_refused() {
        let m = ftc_member("ftc-1", PayMethod::Stripe, 30);
        let err = merge_iap_membership(&m, &Membership::default()).unwrap_err();
        assert_eq!(err.denial(), Some(Denial::HasValidNonIapMember));
    }

    #[test]
    fn merge_is_idempotent() {
        let cases = [
            (Membership::default(), Membership::default()),
            (ftc_member("ftc-1", PayMethod::Alipay, -3), Membership::default()),
            (ftc_member("ftc-1", PayMethod::Alipay, 3), Membership::default()),
            (Membership::default(), apple_member("ftc-2", "1000", 3)),
        ];
        for (m, iap) in cases {
            assert_eq!(merge_iap_membership(&m, &iap), merge_iap_membership(&m, &iap));
        }
    }
}
