//! Row types and column encode/decode for the Postgres adapters.
//!
//! Domain types stay persistence-agnostic; every conversion lives here.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::domain::apple::{Environment, Subscription};
use crate::domain::foundation::{DomainError, ErrorCode, UserIds};
use crate::domain::membership::{
    AddOn, Cycle, Edition, Membership, PayMethod, SubsStatus, Tier,
};
use crate::domain::order::{Order, OrderKind, WebhookPayload};
use crate::domain::stripe::Subs;

/// Columns selected for every membership lookup.
pub(super) const MEMBERSHIP_COLUMNS: &str = r#"
    ftc_id, union_id, tier, cycle, expire_date, payment_method,
    stripe_subs_id, stripe_plan_id, auto_renewal, subs_status,
    apple_subs_id, b2b_licence_id, standard_addon, premium_addon
"#;

#[derive(Debug, sqlx::FromRow)]
pub(super) struct MembershipRow {
    ftc_id: Option<String>,
    union_id: Option<String>,
    tier: Option<String>,
    cycle: Option<String>,
    expire_date: Option<NaiveDate>,
    payment_method: Option<String>,
    stripe_subs_id: Option<String>,
    stripe_plan_id: Option<String>,
    auto_renewal: bool,
    subs_status: Option<String>,
    apple_subs_id: Option<String>,
    b2b_licence_id: Option<String>,
    standard_addon: i64,
    premium_addon: i64,
}

impl TryFrom<MembershipRow> for Membership {
    type Error = DomainError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        let edition = match (row.tier.as_deref(), row.cycle.as_deref()) {
            (Some(tier), Some(cycle)) => Some(Edition::new(parse_tier(tier)?, parse_cycle(cycle)?)),
            _ => None,
        };

        Ok(Membership {
            user_ids: UserIds::new(row.ftc_id, row.union_id).map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid user ids: {}", e))
            })?,
            edition,
            expire_date: row.expire_date,
            payment_method: row.payment_method.as_deref().map(parse_pay_method).transpose()?,
            stripe_subs_id: non_empty(row.stripe_subs_id),
            stripe_plan_id: non_empty(row.stripe_plan_id),
            auto_renewal: row.auto_renewal,
            status: row.subs_status.as_deref().map(parse_subs_status).transpose()?,
            apple_subs_id: non_empty(row.apple_subs_id),
            b2b_licence_id: non_empty(row.b2b_licence_id),
            add_on: AddOn::new(row.standard_addon, row.premium_addon),
            ..Default::default()
        }
        .sync_legacy())
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct AppleSubsRow {
    original_transaction_id: String,
    environment: String,
    last_transaction_id: String,
    product_id: String,
    tier: String,
    cycle: String,
    purchase_date_utc: DateTime<Utc>,
    expires_date_utc: DateTime<Utc>,
    auto_renewal: bool,
    ftc_user_id: Option<String>,
    updated_utc: DateTime<Utc>,
}

impl TryFrom<AppleSubsRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: AppleSubsRow) -> Result<Self, Self::Error> {
        Ok(Subscription {
            environment: Environment::parse(&row.environment).map_err(db_error)?,
            original_transaction_id: row.original_transaction_id,
            last_transaction_id: row.last_transaction_id,
            product_id: row.product_id,
            edition: Edition::new(parse_tier(&row.tier)?, parse_cycle(&row.cycle)?),
            purchase_date_utc: row.purchase_date_utc,
            expires_date_utc: row.expires_date_utc,
            auto_renewal: row.auto_renewal,
            ftc_user_id: non_empty(row.ftc_user_id),
            updated_utc: row.updated_utc,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct OrderRow {
    id: String,
    ftc_id: Option<String>,
    union_id: Option<String>,
    tier: String,
    cycle: String,
    kind: Option<String>,
    pay_method: String,
    amount_cents: i64,
    created_utc: DateTime<Utc>,
    confirmed_utc: Option<DateTime<Utc>>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

impl TryFrom<OrderRow> for Order {
    type Error = DomainError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            user_ids: UserIds::new(row.ftc_id, row.union_id).map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Invalid user ids on order {}: {}", row.id, e),
                )
            })?,
            id: row.id,
            edition: Edition::new(parse_tier(&row.tier)?, parse_cycle(&row.cycle)?),
            kind: row
                .kind
                .as_deref()
                .map(|k| OrderKind::parse(k).map_err(db_error))
                .transpose()?,
            pay_method: parse_pay_method(&row.pay_method)?,
            amount_cents: row.amount_cents,
            created_utc: row.created_utc,
            confirmed_utc: row.confirmed_utc,
            start_date: row.start_date,
            end_date: row.end_date,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct WebhookRow {
    order_id: String,
    pay_method: String,
    payload: Value,
    received_utc: DateTime<Utc>,
}

impl TryFrom<WebhookRow> for WebhookPayload {
    type Error = DomainError;

    fn try_from(row: WebhookRow) -> Result<Self, Self::Error> {
        Ok(WebhookPayload {
            order_id: row.order_id,
            pay_method: parse_pay_method(&row.pay_method)?,
            payload: row.payload,
            received_utc: row.received_utc,
        })
    }
}

/// Column values for writing a [`Subs`].
pub(super) fn subs_tier_cycle(subs: &Subs) -> (&'static str, &'static str) {
    (subs.edition.tier.as_str(), subs.edition.cycle.as_str())
}

pub(super) fn edition_columns(edition: Option<Edition>) -> (Option<&'static str>, Option<&'static str>) {
    match edition {
        Some(e) => (Some(e.tier.as_str()), Some(e.cycle.as_str())),
        None => (None, None),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn db_error(e: impl std::fmt::Display) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, e.to_string())
}

fn parse_tier(s: &str) -> Result<Tier, DomainError> {
    Tier::parse(s).map_err(|_| db_error(format!("Invalid tier value: {}", s)))
}

fn parse_cycle(s: &str) -> Result<Cycle, DomainError> {
    Cycle::parse(s).map_err(|_| db_error(format!("Invalid cycle value: {}", s)))
}

fn parse_pay_method(s: &str) -> Result<PayMethod, DomainError> {
    PayMethod::parse(s).map_err(|_| db_error(format!("Invalid payment method: {}", s)))
}

fn parse_subs_status(s: &str) -> Result<SubsStatus, DomainError> {
    SubsStatus::parse(s).map_err(|_| db_error(format!("Invalid subscription status: {}", s)))
}
