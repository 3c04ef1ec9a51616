//! CreateSubscriptionHandler - Starts a Stripe subscription for a reader.

use std::sync::Arc;

use crate::application::handlers::persist::{abort, write_subs_result};
use crate::domain::foundation::UserIds;
use crate::domain::membership::{permit_stripe_create, Edition, Membership, ReconcileError};
use crate::domain::stripe::{CartIntent, PriceCatalog, SubsResult, SubsSuccessBuilder};
use crate::ports::{MembershipStore, MembershipTx, NewSubsParams, StripeClient};

#[derive(Debug, Clone)]
pub struct CreateSubscriptionCommand {
    pub user_ids: UserIds,
    pub customer_id: String,
    pub edition: Edition,
    pub default_payment_method: Option<String>,
    pub idempotency_key: Option<String>,
}

pub struct CreateSubscriptionHandler {
    store: Arc<dyn MembershipStore>,
    stripe: Arc<dyn StripeClient>,
    prices: Arc<PriceCatalog>,
}

impl CreateSubscriptionHandler {
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
        cmd: CreateSubscriptionCommand,
    ) -> Result<SubsResult, ReconcileError> {
        let mut tx = self.store.begin().await?;

        let result = match self.create(tx.as_mut(), &cmd).await {
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
            modified = result.modified,
            "Stripe subscription created"
        );

        Ok(result)
    }

    async fn create(
        &self,
        tx: &mut dyn MembershipTx,
        cmd: &CreateSubscriptionCommand,
    ) -> Result<SubsResult, ReconcileError> {
        let price_id = self.prices.price_id(cmd.edition).ok_or_else(|| {
            ReconcileError::not_found(format!(
                "no stripe price for {} {}",
                cmd.edition.tier.as_str(),
                cmd.edition.cycle.as_str()
            ))
        })?;

        let current = tx.lock_by_user(&cmd.user_ids).await?;
        let intent = intent_for(&current)?;

        let subs = self
            .stripe
            .new_subs(&NewSubsParams {
                customer_id: cmd.customer_id.clone(),
                price_id: price_id.to_string(),
                ftc_user_id: cmd.user_ids.compound_id().to_string(),
                default_payment_method: cmd.default_payment_method.clone(),
                idempotency_key: cmd.idempotency_key.clone(),
            })
            .await?;

        let result = SubsSuccessBuilder {
            intent,
            user_ids: cmd.user_ids.clone(),
            current,
            subs,
        }
        .build();

        write_subs_result(tx, &result).await?;
        Ok(result)
    }
}

/// A valid one-time purchase may switch to auto-renew, carrying its unused
/// days over. Anything else must pass the create guard.
fn intent_for(current: &Membership) -> Result<CartIntent, ReconcileError> {
    if !current.is_zero() && current.is_one_time() && !current.is_expired() {
        return Ok(CartIntent::OneTimeToAutoRenew);
    }
    permit_stripe_create(current)?;
    Ok(CartIntent::Create)
}
