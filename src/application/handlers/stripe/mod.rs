//! Stripe handlers.
//!
//! ## Reader actions (authoritative)
//! - Creating a subscription, including one-time to auto-renew switches
//! - Upgrading, cancelling, reactivating and refreshing
//!
//! ## Provider notifications (owner known by id only)
//! - Syncing a subscription after a webhook or poll
//! - Verifying and dispatching webhooks

mod create_subscription;
mod handle_webhook;
mod sync_subscription;
mod update_subscription;

pub use create_subscription::{CreateSubscriptionCommand, CreateSubscriptionHandler};
pub use handle_webhook::{
    HandleStripeWebhookCommand, HandleStripeWebhookHandler, HandleWebhookError, WebhookOutcome,
};
pub use sync_subscription::{SyncSubscriptionCommand, SyncSubscriptionHandler};
pub use update_subscription::{SubsAction, UpdateSubscriptionCommand, UpdateSubscriptionHandler};
