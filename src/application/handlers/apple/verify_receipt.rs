//! VerifyReceiptHandler - Verifies an App Store receipt and refreshes the
//! subscription it describes.
//!
//! Receipts are verified against production first; Apple answers 21007
//! for sandbox receipts, which are then resent to the sandbox endpoint.
//! Verified receipts are archived and cached for the IAP poller.

use std::sync::Arc;

use crate::domain::apple::{LinkResult, Subscription, VerificationResponse};
use crate::domain::membership::ReconcileError;
use crate::ports::{AppleClient, ReceiptCache, ReceiptRepository};

use super::RefreshSubscriptionHandler;

#[derive(Debug, Clone)]
pub struct VerifyReceiptCommand {
    /// Base64 receipt as sent by the app.
    pub receipt: String,
}

#[derive(Debug, Clone)]
pub struct VerifiedReceipt {
    pub subs: Subscription,
    pub refreshed: LinkResult,
}

pub struct VerifyReceiptHandler {
    apple: Arc<dyn AppleClient>,
    receipts: Arc<dyn ReceiptRepository>,
    cache: Arc<dyn ReceiptCache>,
    refresh: Arc<RefreshSubscriptionHandler>,
}

impl VerifyReceiptHandler {
    pub fn new(
        apple: Arc<dyn AppleClient>,
        receipts: Arc<dyn ReceiptRepository>,
        cache: Arc<dyn ReceiptCache>,
        refresh: Arc<RefreshSubscriptionHandler>,
    ) -> Self {
        Self {
            apple,
            receipts,
            cache,
            refresh,
        }
    }

    pub async fn handle(&self, cmd: VerifyReceiptCommand) -> Result<VerifiedReceipt, ReconcileError> {
        let response = self.verify(&cmd.receipt).await?;
        let subs = response.subscription()?;

        let latest = if response.latest_receipt.is_empty() {
            cmd.receipt.as_str()
        } else {
            response.latest_receipt.as_str()
        };
        self.archive(&subs.original_transaction_id, latest).await?;

        let refreshed = self.refresh.handle(subs.clone()).await?;
        Ok(VerifiedReceipt { subs, refreshed })
    }

    /// Looks a receipt up in the cache, then the archive. Any cache failure
    /// counts as a miss.
    pub async fn find_receipt(
        &self,
        original_transaction_id: &str,
    ) -> Result<Option<String>, ReconcileError> {
        match self.cache.get(original_transaction_id).await {
            Ok(Some(receipt)) => return Ok(Some(receipt)),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(original_transaction_id, error = %e, "Receipt cache lookup failed");
            }
        }

        let receipt = self.receipts.find_latest(original_transaction_id).await?;
        if let Some(r) = &receipt {
            self.cache_quietly(original_transaction_id, r).await;
        }
        Ok(receipt)
    }

    /// Calls Apple, retrying against the sandbox when told to.
    pub async fn verify(&self, receipt: &str) -> Result<VerificationResponse, ReconcileError> {
        let response = self.apple.verify_receipt(receipt, false).await?;
        if !response.is_sandbox_redirect() {
            return Ok(response);
        }

        tracing::debug!("Sandbox receipt, retrying against sandbox endpoint");
        Ok(self.apple.verify_receipt(receipt, true).await?)
    }

    async fn archive(&self, original_transaction_id: &str, receipt: &str) -> Result<(), ReconcileError> {
        self.receipts.save(original_transaction_id, receipt).await?;
        self.cache_quietly(original_transaction_id, receipt).await;
        Ok(())
    }

    async fn cache_quietly(&self, original_transaction_id: &str, receipt: &str) {
        if let Err(e) = self.cache.set(original_transaction_id, receipt).await {
            tracing::warn!(original_transaction_id, error = %e, "Failed to cache receipt");
        }
    }
}
