//! Stripe subscription status.
//!
//! Mirrors the statuses Stripe reports for a subscription object. Only
//! meaningful on memberships whose payment method is Stripe.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::ValidationError;

/// Stripe subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubsStatus {
    /// Initial payment attempt failed; Stripe waits up to 23 hours.
    Incomplete,

    /// First invoice was never paid. Terminal.
    IncompleteExpired,

    /// In a trial period.
    Trialing,

    /// Paid and current.
    Active,

    /// Renewal payment failed; Stripe is retrying.
    PastDue,

    /// Subscription ended. Terminal.
    Canceled,

    /// Retries exhausted but subscription kept open.
    Unpaid,

    /// Paused by the merchant.
    Paused,
}

impl SubsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubsStatus::Incomplete => "incomplete",
            SubsStatus::IncompleteExpired => "incomplete_expired",
            SubsStatus::Trialing => "trialing",
            SubsStatus::Active => "active",
            SubsStatus::PastDue => "past_due",
            SubsStatus::Canceled => "canceled",
            SubsStatus::Unpaid => "unpaid",
            SubsStatus::Paused => "paused",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "incomplete" => Ok(SubsStatus::Incomplete),
            "incomplete_expired" => Ok(SubsStatus::IncompleteExpired),
            "trialing" => Ok(SubsStatus::Trialing),
            "active" => Ok(SubsStatus::Active),
            "past_due" => Ok(SubsStatus::PastDue),
            "canceled" | "cancelled" => Ok(SubsStatus::Canceled),
            "unpaid" => Ok(SubsStatus::Unpaid),
            "paused" => Ok(SubsStatus::Paused),
            _ => Err(ValidationError::unknown_value("status", s)),
        }
    }

    /// Returns true when the subscription is finished on Stripe's side and
    /// a brand-new subscription may be created in its place.
    pub fn should_create(&self) -> bool {
        matches!(self, SubsStatus::Canceled | SubsStatus::IncompleteExpired)
    }

    /// Returns true if Stripe still considers the reader entitled.
    pub fn is_valid(&self) -> bool {
        matches!(
            self,
            SubsStatus::Active | SubsStatus::Trialing | SubsStatus::PastDue
        )
    }
}

impl std::fmt::Display for SubsStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
