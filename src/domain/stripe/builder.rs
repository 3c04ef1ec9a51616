//! Builders turning a Stripe subscription into a membership decision.
//!
//! Both builders are pure. They read the current membership(s) and the
//! latest [`Subs`], and return a [`SubsResult`] the caller persists.

use crate::domain::foundation::UserIds;
use crate::domain::membership::{
    today, ArchiveReason, CarryOverInvoice, Membership, ReconcileError, Versioned,
};

use super::Subs;

/// What the reader asked for when the subscription was touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartIntent {
    Create,
    /// Valid one-time purchase switching to a recurring subscription.
    OneTimeToAutoRenew,
    Upgrade,
    Cancel,
    Reactivate,
    Refresh,
}

impl CartIntent {
    pub fn archive_reason(&self) -> ArchiveReason {
        match self {
            CartIntent::Create | CartIntent::OneTimeToAutoRenew => ArchiveReason::StripeCreate,
            CartIntent::Upgrade => ArchiveReason::StripeUpgrade,
            CartIntent::Cancel => ArchiveReason::StripeCancel,
            CartIntent::Reactivate => ArchiveReason::StripeReactivate,
            CartIntent::Refresh => ArchiveReason::StripeRefresh,
        }
    }
}

/// Outcome of a Stripe builder.
///
/// `versioned` is present exactly when `modified` is true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsResult {
    pub modified: bool,
    pub subs: Subs,
    pub member: Membership,
    pub versioned: Option<Versioned>,
    pub carry_over: Option<CarryOverInvoice>,
}

impl SubsResult {
    fn changed(
        subs: Subs,
        ante: Membership,
        member: Membership,
        reason: ArchiveReason,
        carry_over: Option<CarryOverInvoice>,
    ) -> Self {
        if ante == member {
            return Self::unchanged(subs, member);
        }
        Self {
            modified: true,
            versioned: Some(Versioned::new(ante, member.clone(), reason)),
            subs,
            member,
            carry_over,
        }
    }

    fn unchanged(subs: Subs, member: Membership) -> Self {
        Self {
            modified: false,
            subs,
            member,
            versioned: None,
            carry_over: None,
        }
    }
}

/// Used when the current reader acted on their own subscription, so the
/// fresh [`Subs`] is authoritative.
#[derive(Debug, Clone)]
pub struct SubsSuccessBuilder {
    pub intent: CartIntent,
    pub user_ids: UserIds,
    pub current: Membership,
    pub subs: Subs,
}

impl SubsSuccessBuilder {
    pub fn build(self) -> SubsResult {
        let mut add_on = self.current.add_on;
        let mut carry_over = None;

        if self.intent == CartIntent::OneTimeToAutoRenew {
            if let Some(mut invoice) = self.current.carry_over_invoice(today()) {
                add_on = invoice.consume(add_on);
                carry_over = Some(invoice);
            }
        }

        let user_ids = if self.current.is_zero() {
            self.user_ids
        } else {
            self.current.user_ids.clone()
        };
        let member = self.subs.build_membership(user_ids, add_on);

        SubsResult::changed(
            self.subs,
            self.current,
            member,
            self.intent.archive_reason(),
            carry_over,
        )
    }
}

/// Used when a webhook or poll delivers a subscription whose owner is only
/// known by id.
///
/// `stripe_member` is the row keyed by the subscription id, `user_member`
/// the row keyed by the reader. Either may be zero.
#[derive(Debug, Clone)]
pub struct SubsSyncBuilder {
    pub user_ids: UserIds,
    pub subs: Subs,
    pub stripe_member: Membership,
    pub user_member: Membership,
    pub reason: ArchiveReason,
}

impl SubsSyncBuilder {
    pub fn build(self) -> Result<SubsResult, ReconcileError> {
        if !self.stripe_member.is_zero() {
            return self.recompute_keyed();
        }

        let Self {
            user_ids,
            subs,
            user_member,
            reason,
            ..
        } = self;

        if user_member.is_zero() {
            let member = subs.build_membership(user_ids, Default::default());
            return Ok(SubsResult::changed(subs, user_member, member, reason, None));
        }

        if user_member.is_expired() {
            let member = subs.build_membership(user_member.user_ids.clone(), user_member.add_on);
            return Ok(SubsResult::changed(subs, user_member, member, reason, None));
        }

        if user_member.is_one_time() {
            // A dead subscription must not replace a valid purchase.
            if subs.is_expired() {
                return Ok(SubsResult::unchanged(subs, user_member));
            }

            let mut add_on = user_member.add_on;
            let carry_over = user_member.carry_over_invoice(today()).map(|mut invoice| {
                add_on = invoice.consume(add_on);
                invoice
            });
            let member = subs.build_membership(user_member.user_ids.clone(), add_on);
            return Ok(SubsResult::changed(
                subs,
                user_member,
                member,
                reason,
                carry_over,
            ));
        }

        // Valid Stripe, Apple or B2B membership from another source.
        Ok(SubsResult::unchanged(subs, user_member))
    }

    fn recompute_keyed(self) -> Result<SubsResult, ReconcileError> {
        if self.stripe_member.compound_id() != self.user_ids.compound_id() {
            return Err(ReconcileError::inconsistent(
                format!(
                    "stripe subscription {} belongs to {}, not {}",
                    self.subs.id,
                    self.stripe_member.compound_id(),
                    self.user_ids.compound_id(),
                ),
                self.stripe_member,
                self.user_member,
            ));
        }

        let member = self
            .subs
            .build_membership(self.stripe_member.user_ids.clone(), self.stripe_member.add_on);

        Ok(SubsResult::changed(
            self.subs,
            self.stripe_member,
            member,
            self.reason,
            None,
        ))
    }
}
