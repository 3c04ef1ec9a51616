//! UnlinkSubscriptionHandler - Detaches an Apple subscription from an FTC
//! account and removes the membership it granted.

use std::sync::Arc;

use crate::application::handlers::persist::abort;
use crate::domain::apple::{Subscription, UnlinkBuilder, UnlinkResult};
use crate::domain::foundation::UserIds;
use crate::domain::membership::ReconcileError;
use crate::ports::{IapRepository, MembershipStore, MembershipTx};

#[derive(Debug, Clone)]
pub struct UnlinkSubscriptionCommand {
    pub user_ids: UserIds,
    pub original_transaction_id: String,
}

pub struct UnlinkSubscriptionHandler {
    store: Arc<dyn MembershipStore>,
    iap: Arc<dyn IapRepository>,
}

impl UnlinkSubscriptionHandler {
    pub fn new(store: Arc<dyn MembershipStore>, iap: Arc<dyn IapRepository>) -> Self {
        Self { store, iap }
    }

    pub async fn handle(
        &self,
        cmd: UnlinkSubscriptionCommand,
    ) -> Result<UnlinkResult, ReconcileError> {
        let subs = self
            .iap
            .find_subs(&cmd.original_transaction_id)
            .await?
            .ok_or_else(|| {
                ReconcileError::not_found(format!(
                    "apple subscription {}",
                    cmd.original_transaction_id
                ))
            })?;

        let mut tx = self.store.begin().await?;
        let result = match unlink(tx.as_mut(), &cmd.user_ids, subs).await {
            Ok(result) => result,
            Err(e) => {
                abort(tx).await;
                return Err(e);
            }
        };
        tx.commit().await?;

        tracing::info!(
            compound_id = %cmd.user_ids,
            original_transaction_id = %cmd.original_transaction_id,
            "Apple subscription unlinked"
        );

        Ok(result)
    }
}

async fn unlink(
    tx: &mut dyn MembershipTx,
    user_ids: &UserIds,
    subs: Subscription,
) -> Result<UnlinkResult, ReconcileError> {
    // Subscription row first to keep the lock order.
    tx.lock_by_apple_id(&subs.original_transaction_id).await?;
    let ftc_side = tx.lock_by_user(user_ids).await?;

    let result = UnlinkBuilder { ftc_side, subs }.build()?;

    tx.save_snapshot(&result.snapshot).await?;
    tx.delete_member(result.snapshot.member.compound_id()).await?;
    tx.upsert_apple_subs(&result.iap_subs).await?;

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryStore;
    use crate::domain::apple::fixtures::iap;
    use crate::domain::membership::{ArchiveReason, Denial};

    #[tokio::test]
    async fn unlink_deletes_membership_and_clears_owner() {
        let store = InMemoryStore::new();
        let subs = Subscription {
            ftc_user_id: Some("ftc-1".into()),
            ..iap("1000", 30)
        };
        store.insert_apple_subs(subs.clone()).await;
        store
            .insert_member(subs.build_membership(UserIds::ftc("ftc-1"), Default::default()))
            .await;
        let handler = UnlinkSubscriptionHandler::new(Arc::new(store.clone()), Arc::new(store.clone()));

        let result = handler
            .handle(UnlinkSubscriptionCommand {
                user_ids: UserIds::ftc("ftc-1"),
                original_transaction_id: "1000".into(),
            })
            .await
            .unwrap();

        assert_eq!(result.snapshot.reason, ArchiveReason::Unlink);
        assert!(store.member("ftc-1").await.is_none());
        assert!(store.apple_subs("1000").await.unwrap().ftc_user_id.is_none());
        assert_eq!(store.snapshots().await.len(), 1);
    }

    #[tokio::test]
    async fn unlinking_foreign_subscription_is_denied() {
        let store = InMemoryStore::new();
        store.insert_apple_subs(iap("1000", 30)).await;
        let handler = UnlinkSubscriptionHandler::new(Arc::new(store.clone()), Arc::new(store.clone()));

        let err = handler
            .handle(UnlinkSubscriptionCommand {
                user_ids: UserIds::ftc("ftc-1"),
                original_transaction_id: "1000".into(),
            })
            .await
            .unwrap_err();

        assert_eq!(err.denial(), Some(Denial::IapNotLinked));
    }
}
