use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::IssueId;

use super::{Membership, ReconcileError};

/// Record of an invariant violation kept for manual inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileIssue {
    pub id: IssueId,
    pub compound_id: String,
    pub subs_id: String,
    pub message: String,
    pub stripe_side: Membership,
    pub user_side: Membership,
    pub created_utc: DateTime<Utc>,
}

impl ReconcileIssue {
    /// Builds an issue from an [`ReconcileError::Inconsistent`]; other
    /// errors yield `None`.
    pub fn from_error(
        compound_id: impl Into<String>,
        subs_id: impl Into<String>,
        err: &ReconcileError,
    ) -> Option<Self> {
        match err {
            ReconcileError::Inconsistent {
                message,
                stripe_side,
                user_side,
            } => Some(Self {
                id: IssueId::new(),
                compound_id: compound_id.into(),
                subs_id: subs_id.into(),
                message: message.clone(),
                stripe_side: stripe_side.as_ref().clone(),
                user_side: user_side.as_ref().clone(),
                created_utc: Utc::now(),
            }),
            _ => None,
        }
    }
}
