//! In-memory receipt cache.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::DomainError;
use crate::ports::ReceiptCache;

#[derive(Clone, Default)]
pub struct InMemoryReceiptCache {
    receipts: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryReceiptCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.receipts.read().await.len()
    }
}

#[async_trait]
impl ReceiptCache for InMemoryReceiptCache {
    async fn get(&self, original_transaction_id: &str) -> Result<Option<String>, DomainError> {
        Ok(self.receipts.read().await.get(original_transaction_id).cloned())
    }

    async fn set(&self, original_transaction_id: &str, receipt: &str) -> Result<(), DomainError> {
        self.receipts
            .write()
            .await
            .insert(original_transaction_id.to_string(), receipt.to_string());
        Ok(())
    }
}
