//! Application layer - Handlers and pollers.
//!
//! This layer orchestrates domain builders and coordinates between ports.

pub mod handlers;
pub mod poller;

pub use handlers::apple::{
    LinkSubscriptionCommand, LinkSubscriptionHandler, RefreshSubscriptionHandler,
    UnlinkSubscriptionCommand, UnlinkSubscriptionHandler, VerifiedReceipt, VerifyReceiptCommand,
    VerifyReceiptHandler,
};
pub use handlers::order::{ConfirmOrderCommand, ConfirmOrderHandler};
pub use handlers::stripe::{
    CreateSubscriptionCommand, CreateSubscriptionHandler, HandleStripeWebhookCommand,
    HandleStripeWebhookHandler, HandleWebhookError, SubsAction, SyncSubscriptionCommand,
    SyncSubscriptionHandler, UpdateSubscriptionCommand, UpdateSubscriptionHandler, WebhookOutcome,
};
pub use poller::{IapPoller, OrderPoller, Schedule, Scheduler};
