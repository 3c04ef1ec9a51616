//! Archival copies of memberships taken before they are overwritten.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{SnapshotId, ValidationError};

use super::Membership;

/// Why a membership was archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveReason {
    Link,
    Unlink,
    StripeCreate,
    StripeUpgrade,
    StripeCancel,
    StripeReactivate,
    StripeWebhook,
    StripeRefresh,
    AppleVerify,
    OrderConfirm,
}

impl ArchiveReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveReason::Link => "link",
            ArchiveReason::Unlink => "unlink",
            ArchiveReason::StripeCreate => "stripe_create",
            ArchiveReason::StripeUpgrade => "stripe_upgrade",
            ArchiveReason::StripeCancel => "stripe_cancel",
            ArchiveReason::StripeReactivate => "stripe_reactivate",
            ArchiveReason::StripeWebhook => "stripe_webhook",
            ArchiveReason::StripeRefresh => "stripe_refresh",
            ArchiveReason::AppleVerify => "apple_verify",
            ArchiveReason::OrderConfirm => "order_confirm",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "link" => Ok(ArchiveReason::Link),
            "unlink" => Ok(ArchiveReason::Unlink),
            "stripe_create" => Ok(ArchiveReason::StripeCreate),
            "stripe_upgrade" => Ok(ArchiveReason::StripeUpgrade),
            "stripe_cancel" => Ok(ArchiveReason::StripeCancel),
            "stripe_reactivate" => Ok(ArchiveReason::StripeReactivate),
            "stripe_webhook" => Ok(ArchiveReason::StripeWebhook),
            "stripe_refresh" => Ok(ArchiveReason::StripeRefresh),
            "apple_verify" => Ok(ArchiveReason::AppleVerify),
            "order_confirm" => Ok(ArchiveReason::OrderConfirm),
            _ => Err(ValidationError::unknown_value("reason", s)),
        }
    }
}

/// Immutable copy of a membership as it was just before a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSnapshot {
    pub id: SnapshotId,
    pub reason: ArchiveReason,
    pub created_by: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub member: Membership,
}

impl MemberSnapshot {
    pub fn new(member: Membership, reason: ArchiveReason) -> Self {
        Self {
            id: SnapshotId::new(),
            reason,
            created_by: None,
            created_utc: Utc::now(),
            member,
        }
    }

    pub fn with_creator(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = Some(created_by.into());
        self
    }
}

/// Before/after lineage of a single membership change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned {
    pub id: SnapshotId,
    pub reason: ArchiveReason,
    /// Zero when the membership was created by this change.
    pub ante_change: Membership,
    pub post_change: Membership,
    pub created_by: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl Versioned {
    pub fn new(ante_change: Membership, post_change: Membership, reason: ArchiveReason) -> Self {
        Self {
            id: SnapshotId::new(),
            reason,
            ante_change,
            post_change,
            created_by: None,
            created_utc: Utc::now(),
        }
    }

    pub fn with_creator(mut self, created_by: Option<String>) -> Self {
        self.created_by = created_by;
        self
    }

    /// Archival copy of the prior state, absent for a fresh membership.
    pub fn snapshot(&self) -> Option<MemberSnapshot> {
        if self.ante_change.is_zero() {
            return None;
        }
        Some(MemberSnapshot {
            id: self.id,
            reason: self.reason,
            created_by: self.created_by.clone(),
            created_utc: self.created_utc,
            member: self.ante_change.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserIds;

    #[test]
    fn versioned_from_zero_has_no_snapshot() {
        let post = Membership {
            user_ids: UserIds::ftc("ftc-1"),
            ..Default::default()
        };
        let v = Versioned::new(Membership::default(), post, ArchiveReason::StripeCreate);
        assert!(v.snapshot().is_none());
    }

    #[test]
    fn versioned_snapshot_archives_ante_change() {
        let ante = Membership {
            user_ids: UserIds::ftc("ftc-1"),
            ..Default::default()
        };
        let v = Versioned::new(ante.clone(), ante.clone(), ArchiveReason::StripeWebhook)
            .with_creator(Some("webhook".into()));

        let snapshot = v.snapshot().unwrap();
        assert_eq!(snapshot.member, ante);
        assert_eq!(snapshot.reason, ArchiveReason::StripeWebhook);
        assert_eq!(snapshot.created_by.as_deref(), Some("webhook"));
    }

    #[test]
    fn reason_round_trips_through_str() {
        let reason = ArchiveReason::parse(ArchiveReason::StripeReactivate.as_str()).unwrap();
        assert_eq!(reason, ArchiveReason::StripeReactivate);
    }
}
