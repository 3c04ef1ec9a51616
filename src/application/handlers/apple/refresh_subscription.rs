//! RefreshSubscriptionHandler - Applies a freshly verified Apple
//! subscription to the membership linked to it.
//!
//! Locks the row keyed by the original transaction id, then the owner's
//! row, and lets [`merge_iap_membership`] decide which membership the new
//! Apple state may replace.

use std::sync::Arc;

use crate::application::handlers::persist::{abort, write_change};
use crate::domain::apple::{LinkResult, Subscription};
use crate::domain::foundation::UserIds;
use crate::domain::membership::{
    merge_iap_membership, ArchiveReason, MemberSnapshot, Membership, ReconcileError,
};
use crate::ports::{IapRepository, MembershipStore, MembershipTx};

pub struct RefreshSubscriptionHandler {
    store: Arc<dyn MembershipStore>,
    iap: Arc<dyn IapRepository>,
}

impl RefreshSubscriptionHandler {
    pub fn new(store: Arc<dyn MembershipStore>, iap: Arc<dyn IapRepository>) -> Self {
        Self { store, iap }
    }

    /// Stores `subs` and, when it is linked, recomputes the membership.
    ///
    /// The result never notifies: renewals are silent.
    pub async fn handle(&self, subs: Subscription) -> Result<LinkResult, ReconcileError> {
        let subs = match self.iap.find_subs(&subs.original_transaction_id).await? {
            Some(stored) => subs.with_owner_of(&stored),
            None => subs,
        };

        let mut tx = self.store.begin().await?;
        let result = match refresh(tx.as_mut(), &subs).await {
            Ok(result) => result,
            Err(e) => {
                abort(tx).await;
                return Err(e);
            }
        };
        tx.commit().await?;

        tracing::info!(
            original_transaction_id = %subs.original_transaction_id,
            compound_id = %result.member.compound_id(),
            touched = result.touched,
            "Apple subscription refreshed"
        );

        Ok(result)
    }
}

async fn refresh(
    tx: &mut dyn MembershipTx,
    subs: &Subscription,
) -> Result<LinkResult, ReconcileError> {
    let iap_member = tx.lock_by_apple_id(&subs.original_transaction_id).await?;
    let user_member = match subs.ftc_user_id.as_deref() {
        Some(owner) => tx.lock_by_user(&UserIds::ftc(owner)).await?,
        None => iap_member.clone(),
    };

    tx.upsert_apple_subs(subs).await?;

    if user_member.is_zero() && subs.ftc_user_id.is_none() {
        return Ok(untouched(user_member));
    }

    let prior = merge_iap_membership(&user_member, &iap_member)?;
    let user_ids = if prior.is_zero() {
        match subs.ftc_user_id.as_deref() {
            Some(owner) => UserIds::ftc(owner),
            None => return Ok(untouched(prior)),
        }
    } else {
        prior.user_ids.clone()
    };

    let member = subs.build_membership(user_ids, prior.add_on);
    if member == prior {
        return Ok(untouched(prior));
    }

    let snapshot = (!prior.is_zero())
        .then(|| MemberSnapshot::new(prior.clone(), ArchiveReason::AppleVerify));
    write_change(tx, snapshot.as_ref(), &prior, &member, None).await?;

    Ok(LinkResult {
        notify: false,
        touched: true,
        member,
        snapshot,
    })
}

fn untouched(member: Membership) -> LinkResult {
    LinkResult {
        notify: false,
        touched: false,
        member,
        snapshot: None,
    }
}
