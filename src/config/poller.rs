//! Poller configuration

use serde::Deserialize;

use crate::application::poller::{Schedule, Scheduler};

use super::error::ValidationError;

/// Poller configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    /// Name written to every poller log row
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Concurrent candidates per run; defaults to the logical CPU count
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    /// `now` to run once, or `HH:MM` to run daily at that UTC time
    #[serde(default = "default_schedule")]
    pub schedule: String,

    #[serde(default = "default_enabled")]
    pub order_enabled: bool,

    /// How far back unconfirmed orders are picked up
    #[serde(default = "default_look_back_days")]
    pub order_look_back_days: i64,

    #[serde(default = "default_enabled")]
    pub iap_enabled: bool,

    /// Apple subscriptions expiring within this many days are re-verified
    #[serde(default = "default_expiring_days")]
    pub iap_expiring_days: i64,

    /// Subscriptions that lapsed longer ago than this are no longer re-verified
    #[serde(default = "default_grace_days")]
    pub iap_grace_days: i64,
}

impl PollerConfig {
    /// Parse the configured schedule
    pub fn schedule(&self) -> Result<Schedule, ValidationError> {
        let raw = self.schedule.trim();
        if raw.eq_ignore_ascii_case("now") {
            return Ok(Schedule::Now);
        }

        let invalid = || ValidationError::InvalidSchedule(raw.to_string());
        let (hour, minute) = raw.split_once(':').ok_or_else(invalid)?;
        let hour: u32 = hour.parse().map_err(|_| invalid())?;
        let minute: u32 = minute.parse().map_err(|_| invalid())?;
        if hour > 23 || minute > 59 {
            return Err(invalid());
        }
        Ok(Schedule::Daily { hour, minute })
    }

    /// A fresh scheduler; every poller needs its own.
    pub fn scheduler(&self) -> Scheduler {
        match self.max_concurrency {
            Some(n) => Scheduler::new(n),
            None => Scheduler::default(),
        }
    }

    /// Window of unconfirmed orders the order poller picks up
    pub fn order_look_back(&self) -> chrono::Duration {
        chrono::Duration::days(self.order_look_back_days)
    }

    /// How far ahead the IAP poller looks for expiring subscriptions
    pub fn iap_look_ahead(&self) -> chrono::Duration {
        chrono::Duration::days(self.iap_expiring_days)
    }

    /// How long after expiry a subscription is still re-verified
    pub fn iap_grace(&self) -> chrono::Duration {
        chrono::Duration::days(self.iap_grace_days)
    }

    /// Validate poller configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.schedule()?;
        if self.max_concurrency == Some(0) {
            return Err(ValidationError::NotPositive("max_concurrency"));
        }
        if self.order_look_back_days <= 0 {
            return Err(ValidationError::NotPositive("order_look_back_days"));
        }
        if self.iap_expiring_days <= 0 {
            return Err(ValidationError::NotPositive("iap_expiring_days"));
        }
        if self.iap_grace_days < 0 {
            return Err(ValidationError::Negative("iap_grace_days"));
        }
        Ok(())
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            max_concurrency: None,
            schedule: default_schedule(),
            order_enabled: true,
            order_look_back_days: default_look_back_days(),
            iap_enabled: true,
            iap_expiring_days: default_expiring_days(),
            iap_grace_days: default_grace_days(),
        }
    }
}

fn default_app_name() -> String {
    "ftc-membership".to_string()
}

fn default_schedule() -> String {
    "now".to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_look_back_days() -> i64 {
    3
}

fn default_expiring_days() -> i64 {
    3
}

fn default_grace_days() -> i64 {
    7
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_schedule(s: &str) -> PollerConfig {
        PollerConfig {
            schedule: s.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_schedule_parsing() {
        assert_eq!(with_schedule("now").schedule().unwrap(), Schedule::Now);
        assert_eq!(
            with_schedule("02:30").schedule().unwrap(),
            Schedule::Daily { hour: 2, minute: 30 }
        );
        assert!(with_schedule("24:00").schedule().is_err());
        assert!(with_schedule("noon").schedule().is_err());
    }

    #[test]
    fn test_explicit_concurrency() {
        let config = PollerConfig {
            max_concurrency: Some(4),
            ..Default::default()
        };
        assert_eq!(config.scheduler().max_concurrency(), 4);
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let config = PollerConfig {
            max_concurrency: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PollerConfig {
            iap_expiring_days: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        assert!(PollerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_iap_window() {
        let config = PollerConfig {
            iap_expiring_days: 5,
            iap_grace_days: 0,
            ..Default::default()
        };
        assert_eq!(config.iap_look_ahead(), chrono::Duration::days(5));
        assert_eq!(config.iap_grace(), chrono::Duration::zero());
        assert!(config.validate().is_ok());

        let config = PollerConfig {
            iap_grace_days: -1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
