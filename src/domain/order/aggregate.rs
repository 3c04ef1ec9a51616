//! One-time Alipay/WeChat purchase.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{UserIds, ValidationError};
use crate::domain::membership::{Edition, PayMethod};

/// How a confirmed order changed the membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    Create,
    Renew,
    Upgrade,
    AddOn,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Create => "create",
            OrderKind::Renew => "renew",
            OrderKind::Upgrade => "upgrade",
            OrderKind::AddOn => "add_on",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "create" => Ok(OrderKind::Create),
            "renew" => Ok(OrderKind::Renew),
            "upgrade" => Ok(OrderKind::Upgrade),
            "add_on" | "addon" => Ok(OrderKind::AddOn),
            _ => Err(ValidationError::unknown_value("kind", s)),
        }
    }
}

/// A one-time Alipay or WeChat purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_ids: UserIds,
    pub edition: Edition,
    /// Decided at confirmation.
    pub kind: Option<OrderKind>,
    pub pay_method: PayMethod,
    /// Charged amount in cents (fen).
    pub amount_cents: i64,
    pub created_utc: DateTime<Utc>,
    pub confirmed_utc: Option<DateTime<Utc>>,
    /// Period covered; unset for add-on orders.
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Order {
    pub fn is_confirmed(&self) -> bool {
        self.confirmed_utc.is_some()
    }
}
