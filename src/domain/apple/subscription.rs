//! Apple auto-renewable subscription fact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{UserIds, ValidationError};
use crate::domain::membership::{AddOn, Edition, Membership, PayMethod};

/// Apple environment a receipt was issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Environment {
    Production,
    Sandbox,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "Production",
            Environment::Sandbox => "Sandbox",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "Production" | "production" => Ok(Environment::Production),
            "Sandbox" | "sandbox" => Ok(Environment::Sandbox),
            _ => Err(ValidationError::unknown_value("environment", s)),
        }
    }
}

/// One Apple subscription, identified by its original transaction id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub environment: Environment,
    pub original_transaction_id: String,
    pub last_transaction_id: String,
    pub product_id: String,
    pub edition: Edition,
    pub purchase_date_utc: DateTime<Utc>,
    pub expires_date_utc: DateTime<Utc>,
    pub auto_renewal: bool,
    /// FTC account this subscription is linked to, if any.
    pub ftc_user_id: Option<String>,
    pub updated_utc: DateTime<Utc>,
}

impl Subscription {
    pub fn is_expired(&self) -> bool {
        self.expires_date_utc.date_naive() < Utc::now().date_naive()
    }

    pub fn is_linked(&self) -> bool {
        self.ftc_user_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    /// Membership granted by this subscription to `user_ids`.
    pub fn build_membership(&self, user_ids: UserIds, add_on: AddOn) -> Membership {
        Membership {
            user_ids,
            edition: Some(self.edition),
            expire_date: Some(self.expires_date_utc.date_naive()),
            payment_method: Some(PayMethod::Apple),
            stripe_subs_id: None,
            stripe_plan_id: None,
            auto_renewal: self.auto_renewal,
            status: None,
            apple_subs_id: Some(self.original_transaction_id.clone()),
            b2b_licence_id: None,
            add_on,
            ..Default::default()
        }
        .sync_legacy()
    }

    /// Copies the link owner from a previously stored row.
    pub fn with_owner_of(mut self, stored: &Subscription) -> Self {
        if self.ftc_user_id.is_none() {
            self.ftc_user_id = stored.ftc_user_id.clone();
        }
        self
    }
}
