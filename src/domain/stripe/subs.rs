//! Stripe subscription fact.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::UserIds;
use crate::domain::membership::{AddOn, Edition, Membership, PayMethod, SubsStatus};

/// A Stripe subscription as last observed.
///
/// `is_from_stripe` is true when the value was built from an API response
/// or webhook, false when rehydrated from our own table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subs {
    pub id: String,
    pub edition: Edition,
    pub price_id: String,
    pub status: SubsStatus,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
    pub cancel_at: Option<DateTime<Utc>>,
    pub canceled_utc: Option<DateTime<Utc>>,
    pub ended_utc: Option<DateTime<Utc>>,
    pub customer_id: String,
    pub default_payment_method: Option<String>,
    pub latest_invoice_id: Option<String>,
    pub payment_intent_id: Option<String>,
    /// Owner recorded in the subscription metadata.
    pub ftc_user_id: Option<String>,
    pub is_from_stripe: bool,
    pub created_utc: DateTime<Utc>,
}

impl Subs {
    /// Moment the entitlement granted by this subscription ends.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at_on(Utc::now())
    }

    pub fn expires_at_on(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        if self.status != SubsStatus::Canceled {
            return self.current_period_end;
        }

        // Canceled by the reader: entitled through the paid period.
        if self.cancel_at_period_end {
            return self.current_period_end;
        }

        match self.cancel_at {
            Some(at) if at > now => at,
            // Canceled automatically, e.g. after payment failures.
            _ => self
                .canceled_utc
                .or(self.ended_utc)
                .unwrap_or(self.current_period_end),
        }
    }

    pub fn expire_date(&self) -> NaiveDate {
        self.expires_at().date_naive()
    }

    /// True once the entitlement end lies before today.
    pub fn is_expired(&self) -> bool {
        self.expires_at_on(Utc::now()).date_naive() < Utc::now().date_naive()
    }

    /// Stripe will charge again at period end.
    pub fn is_auto_renewal(&self) -> bool {
        !self.cancel_at_period_end
            && !matches!(
                self.status,
                SubsStatus::Canceled | SubsStatus::IncompleteExpired
            )
    }

    /// Builds the membership this subscription grants to `user_ids`,
    /// keeping `add_on` reserved for later.
    pub fn build_membership(&self, user_ids: UserIds, add_on: AddOn) -> Membership {
        Membership {
            user_ids,
            edition: Some(self.edition),
            expire_date: Some(self.expire_date()),
            payment_method: Some(PayMethod::Stripe),
            stripe_subs_id: Some(self.id.clone()),
            stripe_plan_id: Some(self.price_id.clone()),
            auto_renewal: self.is_auto_renewal(),
            status: Some(self.status),
            apple_subs_id: None,
            b2b_licence_id: None,
            add_on,
            ..Default::default()
        }
        .sync_legacy()
    }
}
