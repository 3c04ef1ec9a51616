//! SyncSubscriptionHandler - Reconciles a Stripe subscription whose owner
//! is only known by id (webhook or poll).
//!
//! The subscription is re-fetched from Stripe, then two rows are locked in
//! canonical order: the row keyed by the subscription id, then the row
//! keyed by the reader. An owner mismatch rolls back and is recorded as a
//! [`ReconcileIssue`].

use std::sync::Arc;

use crate::application::handlers::persist::{abort, write_subs_result};
use crate::domain::foundation::UserIds;
use crate::domain::membership::{ArchiveReason, ReconcileError, ReconcileIssue};
use crate::domain::stripe::{Subs, SubsResult, SubsSyncBuilder};
use crate::ports::{MembershipStore, MembershipTx, StripeClient};

#[derive(Debug, Clone)]
pub struct SyncSubscriptionCommand {
    pub subs_id: String,
    /// Owner named by the event, used when the subscription carries none.
    pub ftc_user_id: Option<String>,
    pub reason: ArchiveReason,
}

pub struct SyncSubscriptionHandler {
    store: Arc<dyn MembershipStore>,
    stripe: Arc<dyn StripeClient>,
}

impl SyncSubscriptionHandler {
    pub fn new(store: Arc<dyn MembershipStore>, stripe: Arc<dyn StripeClient>) -> Self {
        Self { store, stripe }
    }

    pub async fn handle(&self, cmd: SyncSubscriptionCommand) -> Result<SubsResult, ReconcileError> {
        let subs = self.stripe.fetch_subs(&cmd.subs_id).await?;

        let owner = subs
            .ftc_user_id
            .clone()
            .or_else(|| cmd.ftc_user_id.clone())
            .ok_or_else(|| {
                ReconcileError::not_found(format!("stripe subscription {} has no owner", subs.id))
            })?;
        let user_ids = UserIds::ftc(owner);

        let mut tx = self.store.begin().await?;
        let result = match sync(tx.as_mut(), &user_ids, subs, cmd.reason).await {
            Ok(result) => result,
            Err(e) => {
                abort(tx).await;
                self.record_issue(&user_ids, &cmd.subs_id, &e).await;
                return Err(e);
            }
        };
        tx.commit().await?;

        tracing::info!(
            compound_id = %user_ids,
            subs_id = %cmd.subs_id,
            modified = result.modified,
            "Stripe subscription synced"
        );

        Ok(result)
    }

    async fn record_issue(&self, user_ids: &UserIds, subs_id: &str, err: &ReconcileError) {
        let Some(issue) = ReconcileIssue::from_error(user_ids.compound_id(), subs_id, err) else {
            return;
        };

        tracing::error!(
            compound_id = %user_ids,
            subs_id,
            error = %err,
            "Stripe subscription owner mismatch"
        );

        if let Err(e) = self.store.save_issue(&issue).await {
            tracing::error!(issue_id = %issue.id, error = %e, "Failed to record reconcile issue");
        }
    }
}

async fn sync(
    tx: &mut dyn MembershipTx,
    user_ids: &UserIds,
    subs: Subs,
    reason: ArchiveReason,
) -> Result<SubsResult, ReconcileError> {
    let stripe_member = tx.lock_by_stripe_id(&subs.id).await?;
    let user_member = tx.lock_by_user(user_ids).await?;

    let result = SubsSyncBuilder {
        user_ids: user_ids.clone(),
        subs,
        stripe_member,
        user_member,
        reason,
    }
    .build()?;

    write_subs_result(tx, &result).await?;
    Ok(result)
}
