//! UpdateSubscriptionHandler - Acts on a reader's existing Stripe subscription.
//!
//! Covers upgrade, cancel at period end, reactivation and a plain refresh.
//! The reader owns the subscription, so the value Stripe returns is
//! authoritative and goes through [`SubsSuccessBuilder`].

use std::sync::Arc;

use crate::application::handlers::persist::{abort, write_subs_result};
use crate::domain::foundation::UserIds;
use crate::domain::membership::{
    permit_stripe_upgrade, Denial, Edition, Membership, ReconcileError,
};
use crate::domain::stripe::{CartIntent, PriceCatalog, Subs, SubsResult, SubsSuccessBuilder};
use crate::ports::{MembershipStore, MembershipTx, StripeClient, UpdateSubsParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubsAction {
    /// Switch to a higher edition, prorated by Stripe.
    Upgrade(Edition),
    /// Stop renewal at the end of the current period.
    Cancel,
    /// Undo a pending cancellation.
    Reactivate,
    /// Re-read the subscription from Stripe.
    Refresh,
}

impl SubsAction {
    fn intent(&self) -> CartIntent {
        match self {
            SubsAction::Upgrade(_) => CartIntent::Upgrade,
            SubsAction::Cancel => CartIntent::Cancel,
            SubsAction::Reactivate => CartIntent::Reactivate,
            SubsAction::Refresh => CartIntent::Refresh,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateSubscriptionCommand {
    pub user_ids: UserIds,
    pub action: SubsAction,
    pub idempotency_key: Option<String>,
}

pub struct UpdateSubscriptionHandler {
    store: Arc<dyn MembershipStore>,
    stripe: Arc<dyn StripeClient>,
    prices: Arc<PriceCatalog>,
}

impl UpdateSubscriptionHandler {
    pub fn new(
        store: Arc<dyn MembershipStore>,
        stripe: Arc<dyn StripeClient>,
        prices: Arc<PriceCatalog>,
    ) -> Self {
        Self {
            store,
            stripe,
            prices,
        }
    }

    pub async fn handle(
        &self,
        cmd: UpdateSubscriptionCommand,
    ) -> Result<SubsResult, ReconcileError> {
        let mut tx = self.store.begin().await?;

        let result = match self.update(tx.as_mut(), &cmd).await {
            Ok(result) => result,
            Err(e) => {
                abort(tx).await;
                return Err(e);
            }
        };
        tx.commit().await?;

        tracing::info!(
            compound_id = %cmd.user_ids,
            subs_id = %result.subs.id,
            action = ?cmd.action,
            modified = result.modified,
            "Stripe subscription updated"
        );

        Ok(result)
    }

    async fn update(
        &self,
        tx: &mut dyn MembershipTx,
        cmd: &UpdateSubscriptionCommand,
    ) -> Result<SubsResult, ReconcileError> {
        let current = tx.lock_by_user(&cmd.user_ids).await?;

        let subs_id = match current.stripe_subs_id.as_deref() {
            Some(id) if current.is_stripe() => id.to_string(),
            _ => {
                return Err(ReconcileError::not_found(format!(
                    "no stripe subscription for {}",
                    cmd.user_ids
                )))
            }
        };

        let subs = self.call_stripe(&current, &subs_id, cmd).await?;

        let result = SubsSuccessBuilder {
            intent: cmd.action.intent(),
            user_ids: cmd.user_ids.clone(),
            current,
            subs,
        }
        .build();

        write_subs_result(tx, &result).await?;
        Ok(result)
    }

    async fn call_stripe(
        &self,
        current: &Membership,
        subs_id: &str,
        cmd: &UpdateSubscriptionCommand,
    ) -> Result<Subs, ReconcileError> {
        let subs = match cmd.action {
            SubsAction::Upgrade(edition) => {
                if !permit_stripe_upgrade(current) || current.edition == Some(edition) {
                    return Err(Denial::NotUpgradable.into());
                }
                let price_id = self.prices.price_id(edition).ok_or_else(|| {
                    ReconcileError::not_found(format!(
                        "no stripe price for {} {}",
                        edition.tier.as_str(),
                        edition.cycle.as_str()
                    ))
                })?;
                let params = UpdateSubsParams {
                    price_id: Some(price_id.to_string()),
                    idempotency_key: cmd.idempotency_key.clone(),
                    ..Default::default()
                };
                self.stripe.update_subs(subs_id, &params).await?
            }
            SubsAction::Cancel => self.stripe.cancel_subs(subs_id, true).await?,
            SubsAction::Reactivate => {
                let params = UpdateSubsParams {
                    cancel_at_period_end: Some(false),
                    idempotency_key: cmd.idempotency_key.clone(),
                    ..Default::default()
                };
                self.stripe.update_subs(subs_id, &params).await?
            }
            SubsAction::Refresh => self.stripe.fetch_subs(subs_id).await?,
        };
        Ok(subs)
    }
}
