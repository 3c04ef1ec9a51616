//! Receipt storage ports.
//!
//! Receipts are looked up cache first, then the relational store. Both are
//! keyed by original transaction id and hold the base64 receipt.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;

/// Best-effort receipt cache. A miss is `Ok(None)`, never an error.
#[async_trait]
pub trait ReceiptCache: Send + Sync {
    async fn get(&self, original_transaction_id: &str) -> Result<Option<String>, DomainError>;

    async fn set(&self, original_transaction_id: &str, receipt: &str) -> Result<(), DomainError>;
}

/// Durable archive of Apple receipts.
#[async_trait]
pub trait ReceiptRepository: Send + Sync {
    /// Most recently saved receipt for the subscription.
    async fn find_latest(
        &self,
        original_transaction_id: &str,
    ) -> Result<Option<String>, DomainError>;

    async fn save(&self, original_transaction_id: &str, receipt: &str) -> Result<(), DomainError>;
}
