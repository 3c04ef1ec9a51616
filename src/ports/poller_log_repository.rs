//! Poller run log port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::DomainError;

/// Which poller produced a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollerKind {
    Order,
    Iap,
}

impl PollerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollerKind::Order => "order",
            PollerKind::Iap => "iap",
        }
    }
}

/// Counters for one poller run. Persisted once, when the run ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerLog {
    pub app_name: String,
    pub kind: PollerKind,
    pub total: i64,
    pub succeeded: i64,
    pub failed: i64,
    pub start_utc: DateTime<Utc>,
    pub end_utc: Option<DateTime<Utc>>,
}

impl PollerLog {
    pub fn start(app_name: impl Into<String>, kind: PollerKind) -> Self {
        Self {
            app_name: app_name.into(),
            kind,
            total: 0,
            succeeded: 0,
            failed: 0,
            start_utc: Utc::now(),
            end_utc: None,
        }
    }
}

/// Persists finished poller logs.
#[async_trait]
pub trait PollerLogRepository: Send + Sync {
    async fn save(&self, log: &PollerLog) -> Result<(), DomainError>;
}
