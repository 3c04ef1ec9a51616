//! LinkSubscriptionHandler - Binds a stored Apple subscription to an FTC
//! account.

use std::sync::Arc;

use crate::application::handlers::persist::{abort, write_change};
use crate::domain::apple::{LinkBuilder, LinkResult, Subscription};
use crate::domain::foundation::UserIds;
use crate::domain::membership::ReconcileError;
use crate::ports::{IapRepository, MembershipStore, MembershipTx};

#[derive(Debug, Clone)]
pub struct LinkSubscriptionCommand {
    pub user_ids: UserIds,
    pub original_transaction_id: String,
    /// Replace a membership already bound to another Apple subscription.
    pub force: bool,
}

pub struct LinkSubscriptionHandler {
    store: Arc<dyn MembershipStore>,
    iap: Arc<dyn IapRepository>,
}

impl LinkSubscriptionHandler {
    pub fn new(store: Arc<dyn MembershipStore>, iap: Arc<dyn IapRepository>) -> Self {
        Self { store, iap }
    }

    /// Links and returns whether the reader should get a first-link email.
    pub async fn handle(&self, cmd: LinkSubscriptionCommand) -> Result<LinkResult, ReconcileError> {
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
        let result = match link(tx.as_mut(), &cmd, subs).await {
            Ok(result) => result,
            Err(e) => {
                abort(tx).await;
                if let Some(denial) = e.denial() {
                    tracing::debug!(compound_id = %cmd.user_ids, code = denial.code(), "Apple link denied");
                }
                return Err(e);
            }
        };
        tx.commit().await?;

        tracing::info!(
            compound_id = %cmd.user_ids,
            original_transaction_id = %cmd.original_transaction_id,
            touched = result.touched,
            notify = result.notify,
            "Apple subscription linked"
        );

        Ok(result)
    }
}

async fn link(
    tx: &mut dyn MembershipTx,
    cmd: &LinkSubscriptionCommand,
    subs: Subscription,
) -> Result<LinkResult, ReconcileError> {
    let iap_side = tx.lock_by_apple_id(&subs.original_transaction_id).await?;
    let ftc_side = tx.lock_by_user(&cmd.user_ids).await?;
    let prior = ftc_side.clone();

    let mut linked_subs = subs.clone();
    linked_subs.ftc_user_id = Some(cmd.user_ids.compound_id().to_string());

    let result = LinkBuilder {
        user_ids: cmd.user_ids.clone(),
        ftc_side,
        iap_side,
        subs,
        force: cmd.force,
    }
    .build()?;

    if result.touched {
        write_change(tx, result.snapshot.as_ref(), &prior, &result.member, None).await?;
    }
    tx.upsert_apple_subs(&linked_subs).await?;

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryStore;
    use crate::domain::apple::fixtures::iap;
    use crate::domain::membership::{today, Denial, Edition, Membership};
    use chrono::Duration;

    async fn setup() -> (InMemoryStore, LinkSubscriptionHandler) {
        let store = InMemoryStore::new();
        store.insert_apple_subs(iap("1000", 30)).await;
        let handler = LinkSubscriptionHandler::new(Arc::new(store.clone()), Arc::new(store.clone()));
        (store, handler)
    }

    fn command(ftc_id: &str, force: bool) -> LinkSubscriptionCommand {
        LinkSubscriptionCommand {
            user_ids: UserIds::ftc(ftc_id),
            original_transaction_id: "1000".into(),
            force,
        }
    }

    #[tokio::test]
    async fn first_link_creates_membership_and_notifies() {
        let (store, handler) = setup().await;

        let result = handler.handle(command("ftc-1", false)).await.unwrap();

        assert!(result.notify);
        let member = store.member("ftc-1").await.unwrap();
        assert_eq!(member.apple_subs_id.as_deref(), Some("1000"));
        assert_eq!(
            store.apple_subs("1000").await.unwrap().ftc_user_id.as_deref(),
            Some("ftc-1")
        );
    }

    #[tokio::test]
    async fn second_link_of_same_pair_is_untouched() {
        let (store, handler) = setup().await;
        handler.handle(command("ftc-1", false)).await.unwrap();

        let again = handler.handle(command("ftc-1", false)).await.unwrap();

        assert!(!again.touched);
        assert!(!again.notify);
        assert!(store.snapshots().await.is_empty());
    }

    #[tokio::test]
    async fn linking_into_second_account_is_refused_even_with_force() {
        let (store, handler) = setup().await;
        handler.handle(command("ftc-a", false)).await.unwrap();
        store
            .insert_member(Membership {
                user_ids: UserIds::ftc("ftc-b"),
                edition: Some(Edition::STANDARD_YEAR),
                expire_date: Some(today() - Duration::days(10)),
                ..Default::default()
            })
            .await;

        for force in [false, true] {
            let err = handler.handle(command("ftc-b", force)).await.unwrap_err();
            assert_eq!(err.denial(), Some(Denial::IapAlreadyLinked));
        }
        assert_eq!(
            store.apple_subs("1000").await.unwrap().ftc_user_id.as_deref(),
            Some("ftc-a")
        );
    }

    #[tokio::test]
    async fn unknown_subscription_is_not_found() {
        let (_store, handler) = setup().await;
        let cmd = LinkSubscriptionCommand {
            original_transaction_id: "9999".into(),
            ..command("ftc-1", false)
        };

        let err = handler.handle(cmd).await.unwrap_err();
        assert!(matches!(err, ReconcileError::NotFound(_)));
    }
}
