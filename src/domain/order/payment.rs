//! Payment results recovered from stored provider notifications.
//!
//! Alipay and WeChat notify us once; the raw notification is kept so the
//! order poller can replay it for orders that were never confirmed.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::membership::{Denial, PayMethod, ReconcileError};

use super::Order;

const ALIPAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const WECHAT_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Raw notification as received from the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub order_id: String,
    pub pay_method: PayMethod,
    pub payload: Value,
    pub received_utc: DateTime<Utc>,
}

/// Payment outcome parsed from a stored provider notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub order_id: String,
    pub transaction_id: String,
    pub pay_method: PayMethod,
    pub paid: bool,
    pub amount_cents: i64,
    pub paid_utc: DateTime<Utc>,
}

impl PaymentResult {
    pub fn from_webhook(webhook: &WebhookPayload) -> Result<Self, DomainError> {
        match webhook.pay_method {
            PayMethod::Alipay => Self::from_alipay(&webhook.payload, webhook.received_utc),
            PayMethod::Wxpay => Self::from_wechat(&webhook.payload, webhook.received_utc),
            other => Err(DomainError::validation(
                "pay_method",
                format!("{} orders have no payment webhook", other),
            )),
        }
    }

    fn from_alipay(payload: &Value, received: DateTime<Utc>) -> Result<Self, DomainError> {
        let status = field(payload, "trade_status")?;
        let amount = parse_yuan(field(payload, "total_amount")?)?;
        let paid_utc = optional(payload, "gmt_payment")
            .and_then(|s| beijing_to_utc(s, ALIPAY_TIME_FORMAT))
            .unwrap_or(received);

        Ok(Self {
            order_id: field(payload, "out_trade_no")?.to_string(),
            transaction_id: optional(payload, "trade_no").unwrap_or_default().to_string(),
            pay_method: PayMethod::Alipay,
            paid: matches!(status, "TRADE_SUCCESS" | "TRADE_FINISHED"),
            amount_cents: amount,
            paid_utc,
        })
    }

    fn from_wechat(payload: &Value, received: DateTime<Utc>) -> Result<Self, DomainError> {
        let return_ok = optional(payload, "return_code").map_or(true, |c| c == "SUCCESS");
        let result_ok = field(payload, "result_code")? == "SUCCESS";

        let total_fee = field(payload, "total_fee")?;
        let amount = total_fee
            .parse::<i64>()
            .ok()
            .filter(|fee| *fee >= 0)
            .ok_or_else(|| {
                DomainError::validation("total_fee", format!("not a fee in cents: {}", total_fee))
            })?;

        let paid_utc = optional(payload, "time_end")
            .and_then(|s| beijing_to_utc(s, WECHAT_TIME_FORMAT))
            .unwrap_or(received);

        Ok(Self {
            order_id: field(payload, "out_trade_no")?.to_string(),
            transaction_id: optional(payload, "transaction_id").unwrap_or_default().to_string(),
            pay_method: PayMethod::Wxpay,
            paid: return_ok && result_ok,
            amount_cents: amount,
            paid_utc,
        })
    }

    /// Checks this result actually pays for `order`.
    pub fn verify(&self, order: &Order) -> Result<(), ReconcileError> {
        if self.order_id != order.id {
            return Err(ReconcileError::unknown_state(format!(
                "payment for {} replayed against order {}",
                self.order_id, order.id
            )));
        }
        if !self.paid {
            return Err(Denial::OrderNotPaid.into());
        }
        if self.amount_cents != order.amount_cents {
            return Err(Denial::AmountMismatch.into());
        }
        Ok(())
    }
}

fn optional<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn field<'a>(payload: &'a Value, key: &str) -> Result<&'a str, DomainError> {
    optional(payload, key).ok_or_else(|| {
        DomainError::new(ErrorCode::InvalidFormat, format!("missing {}", key))
            .with_detail("field", key)
    })
}

/// Parses a decimal yuan amount such as `"68.00"` into cents.
///
/// Only unsigned digits are accepted, and amounts that do not fit in cents
/// are rejected rather than wrapped.
fn parse_yuan(s: &str) -> Result<i64, DomainError> {
    let invalid = || DomainError::validation("total_amount", format!("not an amount: {}", s));

    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if whole.is_empty() || frac.len() > 2 || !digits(whole) || !digits(frac) {
        return Err(invalid());
    }
    let whole: i64 = whole.parse().map_err(|_| invalid())?;
    let frac: i64 = if frac.is_empty() {
        0
    } else {
        format!("{:0<2}", frac).parse().map_err(|_| invalid())?
    };
    whole
        .checked_mul(100)
        .and_then(|cents| cents.checked_add(frac))
        .ok_or_else(invalid)
}

fn beijing_to_utc(s: &str, format: &str) -> Option<DateTime<Utc>> {
    let offset = FixedOffset::east_opt(8 * 3600)?;
    NaiveDateTime::parse_from_str(s, format)
        .ok()?
        .and_local_timezone(offset)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}
