//! In-memory database for tests and local runs.
//!
//! A transaction holds the database mutex from `begin` until it is
//! committed, rolled back or dropped, and works on a private copy of the
//! tables. Commit swaps the copy in; anything else discards it. This
//! serializes transactions, which is stronger than row locking.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};

use crate::domain::apple::Subscription;
use crate::domain::foundation::{DomainError, ErrorCode, UserIds};
use crate::domain::membership::{
    CarryOverInvoice, MemberSnapshot, Membership, ReconcileIssue, Versioned,
};
use crate::domain::order::{Order, WebhookPayload};
use crate::domain::stripe::Subs;
use crate::ports::{
    Candidates, IapRepository, MembershipStore, MembershipTx, OrderRepository, PollerLog,
    PollerLogRepository, ReceiptRepository,
};

const STREAM_BUFFER: usize = 16;

#[derive(Debug, Clone, Default)]
struct Tables {
    members: HashMap<String, Membership>,
    snapshots: Vec<MemberSnapshot>,
    versions: Vec<Versioned>,
    invoices: Vec<CarryOverInvoice>,
    stripe_subs: HashMap<String, Subs>,
    apple_subs: HashMap<String, Subscription>,
    orders: Vec<Order>,
    webhooks: HashMap<String, WebhookPayload>,
    receipts: HashMap<String, String>,
}

/// In-memory implementation of every persistence port.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    issues: Arc<Mutex<Vec<ReconcileIssue>>>,
    poller_logs: Arc<Mutex<Vec<PollerLog>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // === Seeding ===

    pub async fn insert_member(&self, member: Membership) {
        let mut tables = self.tables.lock().await;
        tables.members.insert(member.compound_id().to_string(), member);
    }

    pub async fn insert_order(&self, order: Order) {
        self.tables.lock().await.orders.push(order);
    }

    pub async fn insert_webhook(&self, webhook: WebhookPayload) {
        let mut tables = self.tables.lock().await;
        tables.webhooks.insert(webhook.order_id.clone(), webhook);
    }

    pub async fn insert_apple_subs(&self, subs: Subscription) {
        let mut tables = self.tables.lock().await;
        tables
            .apple_subs
            .insert(subs.original_transaction_id.clone(), subs);
    }

    // === Inspection ===

    pub async fn member(&self, compound_id: &str) -> Option<Membership> {
        self.tables.lock().await.members.get(compound_id).cloned()
    }

    pub async fn member_count(&self) -> usize {
        self.tables.lock().await.members.len()
    }

    pub async fn snapshots(&self) -> Vec<MemberSnapshot> {
        self.tables.lock().await.snapshots.clone()
    }

    pub async fn versions(&self) -> Vec<Versioned> {
        self.tables.lock().await.versions.clone()
    }

    pub async fn invoices(&self) -> Vec<CarryOverInvoice> {
        self.tables.lock().await.invoices.clone()
    }

    pub async fn stripe_subs(&self, subs_id: &str) -> Option<Subs> {
        self.tables.lock().await.stripe_subs.get(subs_id).cloned()
    }

    pub async fn apple_subs(&self, original_transaction_id: &str) -> Option<Subscription> {
        self.tables
            .lock()
            .await
            .apple_subs
            .get(original_transaction_id)
            .cloned()
    }

    pub async fn order(&self, order_id: &str) -> Option<Order> {
        self.tables
            .lock()
            .await
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .cloned()
    }

    pub async fn issues(&self) -> Vec<ReconcileIssue> {
        self.issues.lock().await.clone()
    }

    pub async fn poller_logs(&self) -> Vec<PollerLog> {
        self.poller_logs.lock().await.clone()
    }
}

#[async_trait]
impl MembershipStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn MembershipTx>, DomainError> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTx { guard, working }))
    }

    async fn save_issue(&self, issue: &ReconcileIssue) -> Result<(), DomainError> {
        self.issues.lock().await.push(issue.clone());
        Ok(())
    }
}

pub struct InMemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

impl InMemoryTx {
    fn find_member(&self, pred: impl Fn(&Membership) -> bool) -> Membership {
        self.working
            .members
            .values()
            .find(|m| pred(m))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl MembershipTx for InMemoryTx {
    async fn lock_by_stripe_id(&mut self, subs_id: &str) -> Result<Membership, DomainError> {
        Ok(self.find_member(|m| m.stripe_subs_id.as_deref() == Some(subs_id)))
    }

    async fn lock_by_apple_id(
        &mut self,
        original_transaction_id: &str,
    ) -> Result<Membership, DomainError> {
        Ok(self.find_member(|m| m.apple_subs_id.as_deref() == Some(original_transaction_id)))
    }

    async fn lock_by_user(&mut self, user_ids: &UserIds) -> Result<Membership, DomainError> {
        let compound_id = user_ids.compound_id();
        Ok(self.find_member(|m| {
            m.compound_id() == compound_id
                || (user_ids.union_id.is_some() && m.user_ids.union_id == user_ids.union_id)
        }))
    }

    async fn create_member(&mut self, member: &Membership) -> Result<(), DomainError> {
        let key = member.compound_id().to_string();
        if self.working.members.contains_key(&key) {
            return Err(DomainError::new(
                ErrorCode::AlreadyExists,
                format!("Membership already exists for {}", key),
            ));
        }
        self.working.members.insert(key, member.clone());
        Ok(())
    }

    async fn update_member(&mut self, member: &Membership) -> Result<(), DomainError> {
        match self.working.members.get_mut(member.compound_id()) {
            Some(existing) => {
                *existing = member.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::MembershipNotFound,
                format!("Membership not found: {}", member.compound_id()),
            )),
        }
    }

    async fn delete_member(&mut self, compound_id: &str) -> Result<(), DomainError> {
        self.working.members.remove(compound_id);
        Ok(())
    }

    async fn save_snapshot(&mut self, snapshot: &MemberSnapshot) -> Result<(), DomainError> {
        self.working.snapshots.push(snapshot.clone());
        Ok(())
    }

    async fn save_version(&mut self, versioned: &Versioned) -> Result<(), DomainError> {
        self.working.versions.push(versioned.clone());
        Ok(())
    }

    async fn save_invoice(&mut self, invoice: &CarryOverInvoice) -> Result<(), DomainError> {
        match self.working.invoices.iter_mut().find(|i| i.id == invoice.id) {
            Some(existing) => existing.consumed_utc = invoice.consumed_utc,
            None => self.working.invoices.push(invoice.clone()),
        }
        Ok(())
    }

    async fn upsert_stripe_subs(&mut self, subs: &Subs) -> Result<(), DomainError> {
        let mut subs = subs.clone();
        if subs.ftc_user_id.is_none() {
            subs.ftc_user_id = self
                .working
                .stripe_subs
                .get(&subs.id)
                .and_then(|s| s.ftc_user_id.clone());
        }
        self.working.stripe_subs.insert(subs.id.clone(), subs);
        Ok(())
    }

    async fn upsert_apple_subs(&mut self, subs: &Subscription) -> Result<(), DomainError> {
        self.working
            .apple_subs
            .insert(subs.original_transaction_id.clone(), subs.clone());
        Ok(())
    }

    async fn lock_order(&mut self, order_id: &str) -> Result<Option<Order>, DomainError> {
        Ok(self.working.orders.iter().find(|o| o.id == order_id).cloned())
    }

    async fn confirm_order(&mut self, order: &Order) -> Result<(), DomainError> {
        match self.working.orders.iter_mut().find(|o| o.id == order.id) {
            Some(existing) => {
                *existing = order.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::OrderNotFound,
                format!("Order not found: {}", order.id),
            )),
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let InMemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        Ok(())
    }
}

/// Sends `items` on a fresh candidate channel from a producer task.
fn stream<T: Send + 'static>(items: Vec<T>) -> Candidates<T> {
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    tokio::spawn(async move {
        for item in items {
            if tx.send(Ok(item)).await.is_err() {
                break;
            }
        }
    });
    rx
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn stream_unconfirmed(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Candidates<Order>, DomainError> {
        let orders: Vec<Order> = self
            .tables
            .lock()
            .await
            .orders
            .iter()
            .filter(|o| {
                !o.is_confirmed()
                    && o.pay_method.is_one_time()
                    && o.created_utc >= since
            })
            .cloned()
            .collect();

        Ok(stream(orders))
    }

    async fn find_webhook(&self, order_id: &str) -> Result<Option<WebhookPayload>, DomainError> {
        Ok(self.tables.lock().await.webhooks.get(order_id).cloned())
    }
}

#[async_trait]
impl IapRepository for InMemoryStore {
    async fn stream_expiring(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Candidates<Subscription>, DomainError> {
        let mut subs: Vec<Subscription> = self
            .tables
            .lock()
            .await
            .apple_subs
            .values()
            .filter(|s| (from..=until).contains(&s.expires_date_utc))
            .cloned()
            .collect();
        subs.sort_by_key(|s| s.expires_date_utc);

        Ok(stream(subs))
    }

    async fn find_subs(
        &self,
        original_transaction_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self.apple_subs(original_transaction_id).await)
    }
}

#[async_trait]
impl ReceiptRepository for InMemoryStore {
    async fn find_latest(
        &self,
        original_transaction_id: &str,
    ) -> Result<Option<String>, DomainError> {
        Ok(self
            .tables
            .lock()
            .await
            .receipts
            .get(original_transaction_id)
            .cloned())
    }

    async fn save(&self, original_transaction_id: &str, receipt: &str) -> Result<(), DomainError> {
        self.tables
            .lock()
            .await
            .receipts
            .insert(original_transaction_id.to_string(), receipt.to_string());
        Ok(())
    }
}

#[async_trait]
impl PollerLogRepository for InMemoryStore {
    async fn save(&self, log: &PollerLog) -> Result<(), DomainError> {
        self.poller_logs.lock().await.push(log.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::apple::fixtures::iap;
    use chrono::Duration;

    fn member(ftc_id: &str) -> Membership {
        Membership {
            user_ids: UserIds::ftc(ftc_id),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.create_member(&member("ftc-1")).await.unwrap();
        tx.commit().await.unwrap();

        assert!(store.member("ftc-1").await.is_some());
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let store = InMemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.create_member(&member("ftc-1")).await.unwrap();
        }

        assert!(store.member("ftc-1").await.is_none());
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let store = InMemoryStore::new();
        store.insert_member(member("ftc-1")).await;

        let mut tx = store.begin().await.unwrap();
        let err = tx.create_member(&member("ftc-1")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyExists);
    }

    #[tokio::test]
    async fn missing_row_locks_as_zero() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        assert!(tx.lock_by_stripe_id("sub_1").await.unwrap().is_zero());
        assert!(tx.lock_by_user(&UserIds::ftc("ftc-1")).await.unwrap().is_zero());
    }

    #[tokio::test]
    async fn lock_by_user_matches_union_id() {
        let store = InMemoryStore::new();
        store
            .insert_member(Membership {
                user_ids: UserIds::new(None, Some("union-1".into())).unwrap(),
                ..Default::default()
            })
            .await;

        let mut tx = store.begin().await.unwrap();
        let ids = UserIds::new(Some("ftc-1".into()), Some("union-1".into())).unwrap();
        let locked = tx.lock_by_user(&ids).await.unwrap();
        assert_eq!(locked.compound_id(), "union-1");
    }

    #[tokio::test]
    async fn expiring_stream_skips_long_lapsed_subscriptions() {
        let store = InMemoryStore::new();
        store.insert_apple_subs(iap("soon", 2)).await;
        store.insert_apple_subs(iap("lapsed", -3)).await;
        store.insert_apple_subs(iap("dead", -1000)).await;
        store.insert_apple_subs(iap("later", 90)).await;

        let now = Utc::now();
        let mut rx = store
            .stream_expiring(now - Duration::days(7), now + Duration::days(7))
            .await
            .unwrap();

        let mut seen = Vec::new();
        while let Some(subs) = rx.recv().await {
            seen.push(subs.unwrap().original_transaction_id);
        }
        assert_eq!(seen, vec!["lapsed".to_string(), "soon".to_string()]);
    }

    #[tokio::test]
    async fn stream_closes_after_last_candidate() {
        let store = InMemoryStore::new();
        let mut rx = store.stream_unconfirmed(Utc::now()).await.unwrap();
        assert!(rx.recv().await.is_none());
    }
}
