//! Write steps shared by every reconciliation handler.
//!
//! Order inside a transaction: snapshot, then membership, then carry-over
//! invoice. Callers commit.

use crate::domain::foundation::DomainError;
use crate::domain::membership::{CarryOverInvoice, MemberSnapshot, Membership, Versioned};
use crate::domain::stripe::SubsResult;
use crate::ports::MembershipTx;

/// Replaces `prior` with `member`: insert when `prior` is zero, update
/// when both share a key, otherwise delete the old row and insert.
pub(crate) async fn write_member(
    tx: &mut dyn MembershipTx,
    prior: &Membership,
    member: &Membership,
) -> Result<(), DomainError> {
    if prior.is_zero() {
        return tx.create_member(member).await;
    }
    if prior.compound_id() == member.compound_id() {
        return tx.update_member(member).await;
    }
    tx.delete_member(prior.compound_id()).await?;
    tx.create_member(member).await
}

pub(crate) async fn write_change(
    tx: &mut dyn MembershipTx,
    snapshot: Option<&MemberSnapshot>,
    prior: &Membership,
    member: &Membership,
    carry_over: Option<&CarryOverInvoice>,
) -> Result<(), DomainError> {
    if let Some(snapshot) = snapshot {
        tx.save_snapshot(snapshot).await?;
    }
    write_member(tx, prior, member).await?;
    if let Some(invoice) = carry_over {
        tx.save_invoice(invoice).await?;
    }
    Ok(())
}

/// Persists a Stripe builder outcome. The subscription row is always
/// refreshed; the membership only when the builder modified it.
pub(crate) async fn write_subs_result(
    tx: &mut dyn MembershipTx,
    result: &SubsResult,
) -> Result<(), DomainError> {
    if let Some(versioned) = result.versioned.as_ref().filter(|_| result.modified) {
        write_versioned(tx, versioned, &result.member, result.carry_over.as_ref()).await?;
    }
    tx.upsert_stripe_subs(&result.subs).await
}

async fn write_versioned(
    tx: &mut dyn MembershipTx,
    versioned: &Versioned,
    member: &Membership,
    carry_over: Option<&CarryOverInvoice>,
) -> Result<(), DomainError> {
    let snapshot = versioned.snapshot();
    write_change(
        tx,
        snapshot.as_ref(),
        &versioned.ante_change,
        member,
        carry_over,
    )
    .await?;
    tx.save_version(versioned).await
}

/// Rolls back after a failed step. The original error is what the caller
/// reports, so a rollback failure is only logged.
pub(crate) async fn abort(tx: Box<dyn MembershipTx>) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!(error = %e, "Failed to roll back transaction");
    }
}
