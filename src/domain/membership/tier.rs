//! Membership edition: tier × billing cycle.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::ValidationError;

/// Subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Standard,
    Premium,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Standard => "standard",
            Tier::Premium => "premium",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(Tier::Standard),
            "premium" => Ok(Tier::Premium),
            _ => Err(ValidationError::unknown_value("tier", s)),
        }
    }

    /// Legacy integer code mirrored into the `vip_type` column.
    pub fn vip_type(&self) -> i64 {
        match self {
            Tier::Standard => 10,
            Tier::Premium => 100,
        }
    }

    /// Higher rank = more content. Used to tell upgrades from add-ons.
    pub fn rank(&self) -> u8 {
        match self {
            Tier::Standard => 1,
            Tier::Premium => 2,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Billing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cycle {
    Month,
    Year,
}

impl Cycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cycle::Month => "month",
            Cycle::Year => "year",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s.to_lowercase().as_str() {
            "month" => Ok(Cycle::Month),
            "year" => Ok(Cycle::Year),
            _ => Err(ValidationError::unknown_value("cycle", s)),
        }
    }

    /// Calendar date one cycle after `date`.
    ///
    /// Month ends clamp (Jan 31 + 1 month = Feb 28/29).
    pub fn add_to(&self, date: NaiveDate) -> NaiveDate {
        let months = match self {
            Cycle::Month => Months::new(1),
            Cycle::Year => Months::new(12),
        };
        date.checked_add_months(months).unwrap_or(NaiveDate::MAX)
    }

    /// Number of days one cycle spans starting from `date`.
    pub fn days_from(&self, date: NaiveDate) -> i64 {
        (self.add_to(date) - date).num_days()
    }
}

impl std::fmt::Display for Cycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A purchasable product: tier and cycle together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edition {
    pub tier: Tier,
    pub cycle: Cycle,
}

impl Edition {
    pub const STANDARD_MONTH: Edition = Edition::new(Tier::Standard, Cycle::Month);
    pub const STANDARD_YEAR: Edition = Edition::new(Tier::Standard, Cycle::Year);
    pub const PREMIUM_YEAR: Edition = Edition::new(Tier::Premium, Cycle::Year);

    pub const fn new(tier: Tier, cycle: Cycle) -> Self {
        Self { tier, cycle }
    }
}

impl std::fmt::Display for Edition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.tier, self.cycle)
    }
}
