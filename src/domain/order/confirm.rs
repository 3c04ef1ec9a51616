//! Turns a paid one-time order into a membership change.

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::membership::{
    ArchiveReason, CarryOverInvoice, MemberSnapshot, Membership, ReconcileError, Tier,
};

use super::{Order, OrderKind, PaymentResult};

/// Result of confirming a paid order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderConfirmed {
    pub modified: bool,
    pub order: Order,
    pub member: Membership,
    pub snapshot: Option<MemberSnapshot>,
    pub carry_over: Option<CarryOverInvoice>,
}

/// Decides how a paid order extends the reader's membership.
///
/// | Current membership | Order | Result |
/// |--------------------|-------|--------|
/// | zero or expired | any | create, starting on the paid date |
/// | valid one-time, same tier | any cycle | renew from current expiry |
/// | valid one-time standard | premium | upgrade, remaining days carried over |
/// | valid one-time premium | standard | add-on days |
/// | valid Stripe, Apple, B2B | any | add-on days |
#[derive(Debug, Clone)]
pub struct ConfirmationBuilder {
    pub order: Order,
    pub payment: PaymentResult,
    pub current: Membership,
}

impl ConfirmationBuilder {
    pub fn build(self) -> Result<OrderConfirmed, ReconcileError> {
        if self.order.is_confirmed() {
            return Ok(OrderConfirmed {
                modified: false,
                order: self.order,
                member: self.current,
                snapshot: None,
                carry_over: None,
            });
        }

        self.payment.verify(&self.order)?;

        let paid_date = self.payment.paid_utc.date_naive();
        let now = Utc::now();

        if self.current.is_expired_on(paid_date) {
            return Ok(self.create(paid_date, now));
        }

        let current_tier = self.current.tier().ok_or_else(|| {
            ReconcileError::unknown_state(format!(
                "valid membership {} has no edition",
                self.current.compound_id()
            ))
        })?;

        if !self.current.is_one_time() {
            return Ok(self.add_on(paid_date, now));
        }

        let order_tier = self.order.edition.tier;
        match (current_tier, order_tier) {
            (a, b) if a == b => self.renew(now),
            (Tier::Standard, Tier::Premium) => Ok(self.upgrade(paid_date, now)),
            _ => Ok(self.add_on(paid_date, now)),
        }
    }

    fn create(self, paid_date: NaiveDate, now: DateTime<Utc>) -> OrderConfirmed {
        let end = self.order.edition.cycle.add_to(paid_date);
        let user_ids = if self.current.is_zero() {
            self.order.user_ids.clone()
        } else {
            self.current.user_ids.clone()
        };

        let member = Membership {
            user_ids,
            edition: Some(self.order.edition),
            expire_date: Some(end),
            payment_method: Some(self.order.pay_method),
            add_on: self.current.add_on,
            ..Default::default()
        }
        .sync_legacy();

        self.finish(OrderKind::Create, Some((paid_date, end)), member, None, now)
    }

    fn renew(self, now: DateTime<Utc>) -> Result<OrderConfirmed, ReconcileError> {
        let start = self.current.expire_date.ok_or_else(|| {
            ReconcileError::unknown_state("valid membership without expire date")
        })?;
        let end = self.order.edition.cycle.add_to(start);

        let member = Membership {
            edition: Some(self.order.edition),
            expire_date: Some(end),
            payment_method: Some(self.order.pay_method),
            ..self.current.clone()
        }
        .sync_legacy();

        Ok(self.finish(OrderKind::Renew, Some((start, end)), member, None, now))
    }

    fn upgrade(self, paid_date: NaiveDate, now: DateTime<Utc>) -> OrderConfirmed {
        let end = self.order.edition.cycle.add_to(paid_date);

        let mut add_on = self.current.add_on;
        let carry_over = self.current.carry_over_invoice(paid_date).map(|mut invoice| {
            add_on = invoice.consume(add_on);
            invoice
        });

        let member = Membership {
            edition: Some(self.order.edition),
            expire_date: Some(end),
            payment_method: Some(self.order.pay_method),
            add_on,
            ..self.current.clone()
        }
        .sync_legacy();

        self.finish(OrderKind::Upgrade, Some((paid_date, end)), member, carry_over, now)
    }

    fn add_on(self, paid_date: NaiveDate, now: DateTime<Utc>) -> OrderConfirmed {
        let days = self.order.edition.cycle.days_from(paid_date);
        let member = Membership {
            add_on: self.current.add_on.plus(self.order.edition.tier, days),
            ..self.current.clone()
        }
        .sync_legacy();

        self.finish(OrderKind::AddOn, None, member, None, now)
    }

    fn finish(
        self,
        kind: OrderKind,
        period: Option<(NaiveDate, NaiveDate)>,
        member: Membership,
        carry_over: Option<CarryOverInvoice>,
        now: DateTime<Utc>,
    ) -> OrderConfirmed {
        let mut order = self.order;
        order.kind = Some(kind);
        order.confirmed_utc = Some(now);
        order.start_date = period.map(|(start, _)| start);
        order.end_date = period.map(|(_, end)| end);

        let snapshot = (!self.current.is_zero())
            .then(|| MemberSnapshot::new(self.current, ArchiveReason::OrderConfirm));

        OrderConfirmed {
            modified: true,
            order,
            member,
            snapshot,
            carry_over,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserIds;
    use crate::domain::membership::{today, AddOn, Edition, PayMethod};
    use chrono::Duration;

    fn order(edition: Edition) -> Order {
        Order {
            id: "FT0001".into(),
            user_ids: UserIds::ftc("ftc-1"),
            edition,
            kind: None,
            pay_method: PayMethod::Wxpay,
            amount_cents: 29800,
            created_utc: Utc::now(),
            confirmed_utc: None,
            start_date: None,
            end_date: None,
        }
    }

    fn paid() -> PaymentResult {
        PaymentResult {
            order_id: "FT0001".into(),
            transaction_id: "4200000001".into(),
            pay_method: PayMethod::Wxpay,
            paid: true,
            amount_cents: 29800,
            paid_utc: Utc::now(),
        }
    }

    fn member(edition: Edition, method: PayMethod, days_left: i64) -> Membership {
        Membership {
            user_ids: UserIds::ftc("ftc-1"),
            edition: Some(edition),
            expire_date: Some(today() + Duration::days(days_left)),
            payment_method: Some(method),
            ..Default::default()
        }
        .sync_legacy()
    }

    fn confirm(edition: Edition, current: Membership) -> OrderConfirmed {
        ConfirmationBuilder {
            order: order(edition),
            payment: paid(),
            current,
        }
        .build()
        .unwrap()
    }

    #[test]
    fn zero_member_is_created_from_paid_date() {
        let result = confirm(Edition::STANDARD_YEAR, Membership::default());

        assert!(result.modified);
        assert!(result.snapshot.is_none());
        assert_eq!(result.order.kind, Some(OrderKind::Create));
        assert_eq!(result.order.start_date, Some(today()));
        assert_eq!(
            result.member.expire_date,
            Some(Edition::STANDARD_YEAR.cycle.add_to(today()))
        );
        assert_eq!(result.member.payment_method, Some(PayMethod::Wxpay));
    }

    #[test]
    fn expired_member_is_replaced_and_archived() {
        let expired = member(Edition::PREMIUM_YEAR, PayMethod::Stripe, -3);
        let result = confirm(Edition::STANDARD_YEAR, expired.clone());

        assert_eq!(result.order.kind, Some(OrderKind::Create));
        assert_eq!(result.snapshot.unwrap().member, expired);
        assert!(result.member.stripe_subs_id.is_none());
    }

    #[test]
    fn same_tier_renews_from_expiry() {
        let current = member(Edition::STANDARD_YEAR, PayMethod::Alipay, 20);
        let start = current.expire_date.unwrap();
        let result = confirm(Edition::STANDARD_YEAR, current);

        assert_eq!(result.order.kind, Some(OrderKind::Renew));
        assert_eq!(result.order.start_date, Some(start));
        assert_eq!(result.member.expire_date, Some(Edition::STANDARD_YEAR.cycle.add_to(start)));
    }

    #[test]
    fn standard_buying_premium_upgrades_with_carry_over() {
        let current = member(Edition::STANDARD_YEAR, PayMethod::Alipay, 50);
        let result = confirm(Edition::PREMIUM_YEAR, current);

        assert_eq!(result.order.kind, Some(OrderKind::Upgrade));
        assert_eq!(result.member.tier(), Some(Tier::Premium));
        assert_eq!(result.member.add_on, AddOn::new(50, 0));
        assert!(result.carry_over.unwrap().is_consumed());
    }

    #[test]
    fn premium_buying_standard_becomes_add_on() {
        let current = member(Edition::PREMIUM_YEAR, PayMethod::Alipay, 50);
        let result = confirm(Edition::STANDARD_YEAR, current.clone());

        assert_eq!(result.order.kind, Some(OrderKind::AddOn));
        assert_eq!(result.member.expire_date, current.expire_date);
        assert_eq!(
            result.member.add_on.standard_days,
            Edition::STANDARD_YEAR.cycle.days_from(today())
        );
        assert!(result.order.start_date.is_none());
    }

    #[test]
    fn valid_stripe_member_gets_add_on() {
        let current = Membership {
            stripe_subs_id: Some("sub_1".into()),
            auto_renewal: true,
            ..member(Edition::STANDARD_YEAR, PayMethod::Stripe, 100)
        };
        let result = confirm(Edition::PREMIUM_YEAR, current.clone());

        assert_eq!(result.order.kind, Some(OrderKind::AddOn));
        assert_eq!(result.member.stripe_subs_id, current.stripe_subs_id);
        assert!(result.member.add_on.premium_days > 0);
    }

    #[test]
    fn confirmed_order_is_a_no_op() {
        let mut o = order(Edition::STANDARD_YEAR);
        o.confirmed_utc = Some(Utc::now());
        let current = member(Edition::STANDARD_YEAR, PayMethod::Alipay, 20);

        let result = ConfirmationBuilder {
            order: o,
            payment: paid(),
            current: current.clone(),
        }
        .build()
        .unwrap();

        assert!(!result.modified);
        assert_eq!(result.member, current);
    }

    #[test]
    fn unpaid_order_is_denied() {
        let err = ConfirmationBuilder {
            order: order(Edition::STANDARD_YEAR),
            payment: PaymentResult {
                paid: false,
                ..paid()
            },
            current: Membership::default(),
        }
        .build()
        .unwrap_err();

        assert_eq!(err.denial(), Some(crate::domain::membership::Denial::OrderNotPaid));
    }
}
