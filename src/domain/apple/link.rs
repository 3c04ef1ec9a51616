//! Linking and unlinking an Apple subscription to an FTC account.

use crate::domain::foundation::UserIds;
use crate::domain::membership::{
    ArchiveReason, Denial, MemberSnapshot, Membership, ReconcileError,
};

use super::Subscription;

/// Outcome of a link attempt.
///
/// `touched` means the membership row must be written. `notify` means a
/// first-link email should go out; it is never set on a plain renewal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkResult {
    pub notify: bool,
    pub touched: bool,
    pub member: Membership,
    pub snapshot: Option<MemberSnapshot>,
}

/// Decides how an Apple subscription attaches to an FTC account.
///
/// `ftc_side` is the membership under the FTC account, `iap_side` the one
/// keyed by the subscription's original transaction id.
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    pub user_ids: UserIds,
    pub ftc_side: Membership,
    pub iap_side: Membership,
    pub subs: Subscription,
    /// Replace a link to another Apple subscription.
    pub force: bool,
}

impl LinkBuilder {
    pub fn build(self) -> Result<LinkResult, ReconcileError> {
        if self.ftc_side == self.iap_side {
            return Ok(self.build_equal());
        }

        // One Apple subscription maps to at most one FTC account.
        if !self.iap_side.is_zero() {
            return Err(Denial::IapAlreadyLinked.into());
        }

        if self.ftc_side.is_iap_linked() && !self.force {
            return Err(Denial::FtcAlreadyLinked.into());
        }

        if !self.ftc_side.is_expired() && !self.ftc_side.is_iap_linked() {
            if !self.is_legacy_override() {
                return Err(Denial::FtcMemberValid.into());
            }
            tracing::warn!(
                compound_id = %self.ftc_side.compound_id(),
                original_transaction_id = %self.subs.original_transaction_id,
                "overriding valid legacy membership with apple subscription"
            );
        }

        Ok(self.override_ftc_side())
    }

    /// Legacy escape hatch: rows written before payment methods were
    /// recorded are presumed to have come from Apple when they expire
    /// before the incoming subscription. Only meant for migrated data.
    fn is_legacy_override(&self) -> bool {
        self.ftc_side.payment_method.is_none()
            && self
                .ftc_side
                .expire_date
                .is_some_and(|d| d < self.subs.expires_date_utc.date_naive())
    }

    fn build_equal(self) -> LinkResult {
        if self.ftc_side.is_zero() {
            return LinkResult {
                notify: true,
                touched: true,
                member: self.subs.build_membership(self.user_ids, Default::default()),
                snapshot: None,
            };
        }

        let member = self
            .subs
            .build_membership(self.ftc_side.user_ids.clone(), self.ftc_side.add_on);

        if member.expire_date == self.ftc_side.expire_date {
            return LinkResult {
                notify: false,
                touched: false,
                member: self.ftc_side,
                snapshot: None,
            };
        }

        LinkResult {
            notify: false,
            touched: true,
            member,
            snapshot: Some(MemberSnapshot::new(self.ftc_side, ArchiveReason::Link)),
        }
    }

    fn override_ftc_side(self) -> LinkResult {
        let member = self
            .subs
            .build_membership(self.ftc_side.user_ids.clone(), self.ftc_side.add_on);

        LinkResult {
            notify: true,
            touched: true,
            member,
            snapshot: Some(MemberSnapshot::new(self.ftc_side, ArchiveReason::Link)),
        }
    }
}

/// Outcome of unlinking an Apple subscription from its FTC account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlinkResult {
    /// Subscription with its FTC owner cleared.
    pub iap_subs: Subscription,
    pub snapshot: MemberSnapshot,
}

/// Detaches an Apple subscription from the FTC account it is linked to.
#[derive(Debug, Clone)]
pub struct UnlinkBuilder {
    pub ftc_side: Membership,
    pub subs: Subscription,
}

impl UnlinkBuilder {
    pub fn build(self) -> Result<UnlinkResult, ReconcileError> {
        let linked = self.ftc_side.apple_subs_id.as_deref()
            == Some(self.subs.original_transaction_id.as_str());
        if self.ftc_side.is_zero() || !linked {
            return Err(Denial::IapNotLinked.into());
        }

        let mut iap_subs = self.subs;
        iap_subs.ftc_user_id = None;

        Ok(UnlinkResult {
            iap_subs,
            snapshot: MemberSnapshot::new(self.ftc_side, ArchiveReason::Unlink),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::apple::fixtures::iap;
    use crate::domain::membership::{today, AddOn, Edition, PayMethod};
    use chrono::Duration;

    fn one_time(ftc_id: &str, days_left: i64) -> Membership {
        Membership {
            user_ids: UserIds::ftc(ftc_id),
            edition: Some(Edition::STANDARD_YEAR),
            expire_date: Some(today() + Duration::days(days_left)),
            payment_method: Some(PayMethod::Alipay),
            ..Default::default()
        }
        .sync_legacy()
    }

    fn link(ftc_side: Membership, iap_side: Membership, subs: Subscription) -> LinkBuilder {
        LinkBuilder {
            user_ids: UserIds::ftc("ftc-1"),
            ftc_side,
            iap_side,
            subs,
            force: false,
        }
    }

    #[test]
    fn first_link_notifies() {
        let result = link(Membership::default(), Membership::default(), iap("1000", 30))
            .build()
            .unwrap();

        assert!(result.notify);
        assert!(result.touched);
        assert!(result.snapshot.is_none());
        assert_eq!(result.member.compound_id(), "ftc-1");
        assert_eq!(result.member.apple_subs_id.as_deref(), Some("1000"));
    }

    #[test]
    fn relinking_with_same_expiry_is_untouched() {
        let subs = iap("1000", 30);
        let first = link(Membership::default(), Membership::default(), subs.clone())
            .build()
            .unwrap();

        let second = link(first.member.clone(), first.member.clone(), subs)
            .build()
            .unwrap();

        assert!(!second.touched);
        assert!(!second.notify);
        assert!(second.snapshot.is_none());
        assert_eq!(second.member, first.member);
    }

    #[test]
    fn renewal_updates_silently_with_one_snapshot() {
        let linked = iap("1000", 30).build_membership(UserIds::ftc("ftc-1"), AddOn::default());

        let result = link(linked.clone(), linked.clone(), iap("1000", 395))
            .build()
            .unwrap();

        assert!(result.touched);
        assert!(!result.notify);
        assert_eq!(result.snapshot.unwrap().member, linked);
        assert_ne!(result.member.expire_date, linked.expire_date);
    }

    #[test]
    fn iap_bound_elsewhere_is_refused_even_with_force() {
        let elsewhere = iap("1000", 30).build_membership(UserIds::ftc("ftc-a"), AddOn::default());

        for ftc_side in [Membership::default(), one_time("ftc-1", -30), one_time("ftc-1", 30)] {
            for force in [false, true] {
                let err = LinkBuilder {
                    force,
                    ..link(ftc_side.clone(), elsewhere.clone(), iap("1000", 30))
                }
                .build()
                .unwrap_err();
                assert_eq!(err.denial(), Some(Denial::IapAlreadyLinked));
            }
        }
    }

    #[test]
    fn ftc_linked_to_other_iap_needs_force() {
        let other = iap("2000", 30).build_membership(UserIds::ftc("ftc-1"), AddOn::default());

        let err = link(other.clone(), Membership::default(), iap("1000", 60))
            .build()
            .unwrap_err();
        assert_eq!(err.denial(), Some(Denial::FtcAlreadyLinked));

        let forced = LinkBuilder {
            force: true,
            ..link(other.clone(), Membership::default(), iap("1000", 60))
        }
        .build()
        .unwrap();
        assert!(forced.touched);
        assert_eq!(forced.member.apple_subs_id.as_deref(), Some("1000"));
        assert_eq!(forced.snapshot.unwrap().member, other);
    }

    #[test]
    fn valid_non_iap_member_is_refused() {
        let err = link(one_time("ftc-1", 30), Membership::default(), iap("1000", 60))
            .build()
            .unwrap_err();
        assert_eq!(err.denial(), Some(Denial::FtcMemberValid));
    }

    #[test]
    fn legacy_row_expiring_earlier_is_overridden() {
        // Migration-only rule for rows that predate payment methods.
        let legacy = Membership {
            payment_method: None,
            ..one_time("ftc-1", 30)
        };
        let result = link(legacy.clone(), Membership::default(), iap("1000", 60))
            .build()
            .unwrap();

        assert!(result.touched);
        assert_eq!(result.snapshot.unwrap().member, legacy);
    }

    #[test]
    fn legacy_row_expiring_later_is_kept() {
        let legacy = Membership {
            payment_method: None,
            ..one_time("ftc-1", 90)
        };
        let err = link(legacy, Membership::default(), iap("1000", 60))
            .build()
            .unwrap_err();
        assert_eq!(err.denial(), Some(Denial::FtcMemberValid));
    }

    #[test]
    fn expired_member_is_overridden_with_snapshot() {
        let expired = one_time("ftc-1", -1);
        let result = link(expired.clone(), Membership::default(), iap("1000", 60))
            .build()
            .unwrap();

        assert!(result.notify);
        assert_eq!(result.member.payment_method, Some(PayMethod::Apple));
        assert_eq!(result.snapshot.unwrap().member, expired);
    }

    #[test]
    fn unlink_clears_owner_and_archives() {
        let subs = Subscription {
            ftc_user_id: Some("ftc-1".into()),
            ..iap("1000", 30)
        };
        let member = subs.build_membership(UserIds::ftc("ftc-1"), AddOn::default());

        let result = UnlinkBuilder {
            ftc_side: member.clone(),
            subs,
        }
        .build()
        .unwrap();

        assert!(result.iap_subs.ftc_user_id.is_none());
        assert_eq!(result.snapshot.member, member);
        assert_eq!(result.snapshot.reason, ArchiveReason::Unlink);
    }

    #[test]
    fn unlink_of_other_subscription_is_refused() {
        let member = iap("2000", 30).build_membership(UserIds::ftc("ftc-1"), AddOn::default());
        let err = UnlinkBuilder {
            ftc_side: member,
            subs: iap("1000", 30),
        }
        .build()
        .unwrap_err();
        assert_eq!(err.denial(), Some(Denial::IapNotLinked));
    }
}
