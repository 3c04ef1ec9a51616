//! Membership aggregate entity.
//!
//! The Membership is the single authoritative entitlement record for a
//! reader, whichever channel it was bought through.
//!
//! # Invariants
//!
//! - At most one of `stripe_subs_id`, `apple_subs_id`, `b2b_licence_id` is set
//! - A set Stripe/Apple key implies the matching `payment_method`
//! - `vip_type` and `expire_time` are derived from `edition` and `expire_date`
//!   by [`Membership::sync_legacy`]; they are never set on their own
//! - A default (zero) value means "no membership"

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::UserIds;

use super::{AddOn, CarryOverInvoice, Edition, PayMethod, SubsStatus, Tier};

/// Current calendar date in UTC.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// A reader's single authoritative entitlement, whichever channel paid for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub user_ids: UserIds,
    pub edition: Option<Edition>,
    pub expire_date: Option<NaiveDate>,
    /// `None` only on legacy rows written before the column existed.
    pub payment_method: Option<PayMethod>,
    pub stripe_subs_id: Option<String>,
    pub stripe_plan_id: Option<String>,
    pub auto_renewal: bool,
    pub status: Option<SubsStatus>,
    pub apple_subs_id: Option<String>,
    pub b2b_licence_id: Option<String>,
    pub add_on: AddOn,

    /// Legacy mirror of the tier (0, 10, 100).
    pub vip_type: i64,
    /// Legacy mirror of the expire date as unix seconds.
    pub expire_time: i64,
}

impl Membership {
    /// Recomputes the legacy mirror columns from the canonical fields.
    pub fn sync_legacy(mut self) -> Self {
        self.vip_type = self.edition.map(|e| e.tier.vip_type()).unwrap_or(0);
        self.expire_time = self
            .expire_date
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(0);
        self
    }

    /// True for the empty membership of a reader who never paid.
    pub fn is_zero(&self) -> bool {
        self.user_ids.is_empty()
    }

    pub fn compound_id(&self) -> &str {
        self.user_ids.compound_id()
    }

    pub fn tier(&self) -> Option<Tier> {
        self.edition.map(|e| e.tier)
    }

    /// Expired when absent, undated, or dated strictly before today.
    pub fn is_expired(&self) -> bool {
        self.is_expired_on(today())
    }

    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        if self.is_zero() {
            return true;
        }
        match self.expire_date {
            Some(date) => date < today,
            None => true,
        }
    }

    pub fn is_ali_or_wx(&self) -> bool {
        !self.is_zero() && matches!(self.payment_method, Some(m) if m.is_one_time())
    }

    /// One-time purchase, including legacy rows with no payment method.
    ///
    /// Legacy rows predate Stripe and Apple support and were all sold as
    /// one-time orders.
    pub fn is_one_time(&self) -> bool {
        !self.is_zero()
            && match self.payment_method {
                Some(m) => m.is_one_time(),
                None => true,
            }
    }

    pub fn is_stripe(&self) -> bool {
        !self.is_zero() && self.payment_method == Some(PayMethod::Stripe)
    }

    pub fn is_apple(&self) -> bool {
        !self.is_zero() && self.payment_method == Some(PayMethod::Apple)
    }

    pub fn is_b2b(&self) -> bool {
        !self.is_zero() && self.payment_method == Some(PayMethod::B2b)
    }

    /// Bound to an Apple subscription, whatever its payment method says.
    pub fn is_iap_linked(&self) -> bool {
        self.apple_subs_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    /// Checks channel exclusivity and key/method agreement.
    pub fn channels_consistent(&self) -> bool {
        let keys = [
            &self.stripe_subs_id,
            &self.apple_subs_id,
            &self.b2b_licence_id,
        ]
        .iter()
        .filter(|k| k.as_deref().is_some_and(|s| !s.is_empty()))
        .count();

        if keys > 1 {
            return false;
        }
        if self.stripe_subs_id.is_some() && self.payment_method != Some(PayMethod::Stripe) {
            return false;
        }
        if self.is_iap_linked() && self.payment_method != Some(PayMethod::Apple) {
            return false;
        }
        true
    }

    /// Whole days left before expiry; zero once expired.
    pub fn remaining_days_on(&self, today: NaiveDate) -> i64 {
        match self.expire_date {
            Some(date) if !self.is_zero() && date > today => (date - today).num_days(),
            _ => 0,
        }
    }

    /// Converts the unused part of a one-time purchase into a carry-over
    /// invoice.
    ///
    /// Returns `None` for non one-time memberships or when nothing is left.
    pub fn carry_over_invoice(&self, today: NaiveDate) -> Option<CarryOverInvoice> {
        if !self.is_one_time() {
            return None;
        }
        let tier = self.tier()?;
        let days = self.remaining_days_on(today);
        if days <= 0 {
            return None;
        }
        Some(CarryOverInvoice::new(
            self.compound_id(),
            tier,
            days,
            self.payment_method,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn one_time(days_left: i64) -> Membership {
        Membership {
            user_ids: UserIds::ftc("ftc-1"),
            edition: Some(Edition::STANDARD_YEAR),
            expire_date: Some(today() + Duration::days(days_left)),
            payment_method: Some(PayMethod::Alipay),
            ..Default::default()
        }
        .sync_legacy()
    }

    #[test]
    fn default_membership_is_zero_and_expired() {
        let m = Membership::default();
        assert!(m.is_zero());
        assert!(m.is_expired());
    }

    #[test]
    fn expires_only_after_expire_date_passes() {
        assert!(!one_time(0).is_expired());
        assert!(one_time(-1).is_expired());
    }

    #[test]
    fn sync_legacy_derives_vip_type_and_expire_time() {
        let m = Membership {
            user_ids: UserIds::ftc("ftc-1"),
            edition: Some(Edition::PREMIUM_YEAR),
            expire_date: NaiveDate::from_ymd_opt(2024, 1, 15),
            ..Default::default()
        }
        .sync_legacy();

        assert_eq!(m.vip_type, 100);
        assert_eq!(m.expire_time, 1705276800);
    }

    #[test]
    fn legacy_row_without_method_counts_as_one_time() {
        let m = Membership {
            payment_method: None,
            ..one_time(10)
        };
        assert!(m.is_one_time());
        assert!(!m.is_ali_or_wx());
    }

    #[test]
    fn carry_over_captures_remaining_days() {
        let invoice = one_time(45).carry_over_invoice(today()).unwrap();
        assert_eq!(invoice.days, 45);
        assert_eq!(invoice.tier, Tier::Standard);
        assert_eq!(invoice.source, Some(PayMethod::Alipay));
        assert!(!invoice.is_consumed());
    }

    #[test]
    fn no_carry_over_for_expired_or_recurring_members() {
        assert!(one_time(-3).carry_over_invoice(today()).is_none());

        let stripe = Membership {
            payment_method: Some(PayMethod::Stripe),
            stripe_subs_id: Some("sub_1".into()),
            ..one_time(45)
        };
        assert!(stripe.carry_over_invoice(today()).is_none());
    }

    #[test]
    fn two_channel_keys_violate_exclusivity() {
        let m = Membership {
            payment_method: Some(PayMethod::Stripe),
            stripe_subs_id: Some("sub_1".into()),
            apple_subs_id: Some("1000000".into()),
            ..one_time(10)
        };
        assert!(!m.channels_consistent());
    }

    #[test]
    fn stripe_key_requires_stripe_method() {
        let m = Membership {
            stripe_subs_id: Some("sub_1".into()),
            ..one_time(10)
        };
        assert!(!m.channels_consistent());
    }
}
