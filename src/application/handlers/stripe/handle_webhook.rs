//! HandleStripeWebhookHandler - Verifies a Stripe webhook and syncs the
//! subscription it points at.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::membership::{ArchiveReason, ReconcileError};
use crate::domain::stripe::{StripeWebhookVerifier, SubsResult, WebhookError};

use super::{SyncSubscriptionCommand, SyncSubscriptionHandler};

#[derive(Debug, Clone)]
pub struct HandleStripeWebhookCommand {
    pub payload: Vec<u8>,
    pub signature: String,
}

#[derive(Debug, Clone)]
pub enum WebhookOutcome {
    Synced(Box<SubsResult>),
    /// Verified, but not about a subscription.
    Ignored(String),
}

#[derive(Debug, Error)]
pub enum HandleWebhookError {
    #[error(transparent)]
    Webhook(#[from] WebhookError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

pub struct HandleStripeWebhookHandler {
    verifier: StripeWebhookVerifier,
    sync: Arc<SyncSubscriptionHandler>,
}

impl HandleStripeWebhookHandler {
    pub fn new(verifier: StripeWebhookVerifier, sync: Arc<SyncSubscriptionHandler>) -> Self {
        Self { verifier, sync }
    }

    pub async fn handle(
        &self,
        cmd: HandleStripeWebhookCommand,
    ) -> Result<WebhookOutcome, HandleWebhookError> {
        let event = self
            .verifier
            .verify_and_parse(&cmd.payload, &cmd.signature)
            .map_err(|e| {
                tracing::warn!(error = %e, "Rejected Stripe webhook");
                e
            })?;

        let subs_ref = match event.subscription_ref() {
            Ok(r) => r,
            Err(WebhookError::Ignored(reason)) => {
                tracing::debug!(event_id = %event.id, event_type = %event.event_type, "Ignoring Stripe event");
                return Ok(WebhookOutcome::Ignored(reason));
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            subs_id = %subs_ref.subs_id,
            "Processing Stripe event"
        );

        let result = self
            .sync
            .handle(SyncSubscriptionCommand {
                subs_id: subs_ref.subs_id,
                ftc_user_id: subs_ref.ftc_user_id,
                reason: ArchiveReason::StripeWebhook,
            })
            .await?;

        Ok(WebhookOutcome::Synced(Box::new(result)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryStore, MockStripeClient};
    use crate::domain::stripe::compute_test_signature;
    use crate::domain::stripe::fixtures::subs;
    use secrecy::SecretString;

    const SECRET: &str = "whsec_test";

    fn handler(store: &InMemoryStore, stripe: &MockStripeClient) -> HandleStripeWebhookHandler {
        let sync = SyncSubscriptionHandler::new(Arc::new(store.clone()), Arc::new(stripe.clone()));
        HandleStripeWebhookHandler::new(
            StripeWebhookVerifier::new(SecretString::new(SECRET.to_string())),
            Arc::new(sync),
        )
    }

    fn signed(payload: serde_json::Value) -> HandleStripeWebhookCommand {
        let body = payload.to_string();
        let ts = chrono::Utc::now().timestamp();
        HandleStripeWebhookCommand {
            signature: format!("t={},v1={}", ts, compute_test_signature(SECRET, ts, &body)),
            payload: body.into_bytes(),
        }
    }

    #[tokio::test]
    async fn invoice_event_syncs_subscription() {
        let store = InMemoryStore::new();
        let stripe = MockStripeClient::new();
        stripe.insert(subs("sub_1", "ftc-1", 365));

        let outcome = handler(&store, &stripe)
            .handle(signed(serde_json::json!({
                "id": "evt_1",
                "type": "invoice.paid",
                "created": 1704067200,
                "data": { "object": { "id": "in_1", "subscription": "sub_1" } }
            })))
            .await
            .unwrap();

        assert!(matches!(outcome, WebhookOutcome::Synced(r) if r.modified));
        assert!(store.member("ftc-1").await.is_some());
    }

    #[tokio::test]
    async fn unrelated_event_is_ignored() {
        let store = InMemoryStore::new();
        let stripe = MockStripeClient::new();

        let outcome = handler(&store, &stripe)
            .handle(signed(serde_json::json!({
                "id": "evt_2",
                "type": "customer.created",
                "created": 1704067200,
                "data": { "object": { "id": "cus_1" } }
            })))
            .await
            .unwrap();

        assert!(matches!(outcome, WebhookOutcome::Ignored(_)));
        assert!(stripe.calls().is_empty());
    }

    #[tokio::test]
    async fn bad_signature_is_rejected() {
        let store = InMemoryStore::new();
        let stripe = MockStripeClient::new();
        let mut cmd = signed(serde_json::json!({ "id": "evt_3" }));
        cmd.signature = format!("t={},v1={}", chrono::Utc::now().timestamp(), "00".repeat(32));

        let err = handler(&store, &stripe).handle(cmd).await.unwrap_err();
        assert!(matches!(err, HandleWebhookError::Webhook(WebhookError::InvalidSignature)));
    }
}
