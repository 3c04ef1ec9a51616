//! Transactional membership store port.
//!
//! Every reconciliation runs inside one [`MembershipTx`]:
//!
//! 1. Lock the rows involved. Subscription-keyed rows are always locked
//!    before user-keyed rows so concurrent handlers cannot deadlock.
//! 2. Feed the locked values to a pure builder.
//! 3. Write snapshot, then membership, then carry-over invoice.
//! 4. Commit. Any error rolls back.
//!
//! Lock methods return a zero [`Membership`] when no row exists.

use async_trait::async_trait;

use crate::domain::apple::Subscription;
use crate::domain::foundation::{DomainError, UserIds};
use crate::domain::membership::{
    CarryOverInvoice, MemberSnapshot, Membership, ReconcileIssue, Versioned,
};
use crate::domain::order::Order;
use crate::domain::stripe::Subs;

/// Entry point to transactional membership writes.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn MembershipTx>, DomainError>;

    /// Records an invariant violation outside any transaction, so it
    /// survives the rollback of the attempt that found it.
    async fn save_issue(&self, issue: &ReconcileIssue) -> Result<(), DomainError>;
}

/// One open transaction. Locks are held until commit or rollback.
#[async_trait]
pub trait MembershipTx: Send {
    async fn lock_by_stripe_id(&mut self, subs_id: &str) -> Result<Membership, DomainError>;

    async fn lock_by_apple_id(
        &mut self,
        original_transaction_id: &str,
    ) -> Result<Membership, DomainError>;

    async fn lock_by_user(&mut self, user_ids: &UserIds) -> Result<Membership, DomainError>;

    async fn create_member(&mut self, member: &Membership) -> Result<(), DomainError>;

    async fn update_member(&mut self, member: &Membership) -> Result<(), DomainError>;

    async fn delete_member(&mut self, compound_id: &str) -> Result<(), DomainError>;

    async fn save_snapshot(&mut self, snapshot: &MemberSnapshot) -> Result<(), DomainError>;

    async fn save_version(&mut self, versioned: &Versioned) -> Result<(), DomainError>;

    async fn save_invoice(&mut self, invoice: &CarryOverInvoice) -> Result<(), DomainError>;

    async fn upsert_stripe_subs(&mut self, subs: &Subs) -> Result<(), DomainError>;

    async fn upsert_apple_subs(&mut self, subs: &Subscription) -> Result<(), DomainError>;

    /// Locks an order row. Returns `None` if the order does not exist.
    async fn lock_order(&mut self, order_id: &str) -> Result<Option<Order>, DomainError>;

    async fn confirm_order(&mut self, order: &Order) -> Result<(), DomainError>;

    async fn commit(self: Box<Self>) -> Result<(), DomainError>;

    async fn rollback(self: Box<Self>) -> Result<(), DomainError>;
}
