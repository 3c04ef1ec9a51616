//! Apple In-App Purchase handlers.
//!
//! - Verifying receipts and refreshing the subscriptions they describe
//! - Linking a subscription to an FTC account, with the anti-fraud rule
//! - Unlinking

mod link_subscription;
mod refresh_subscription;
mod unlink_subscription;
mod verify_receipt;

pub use link_subscription::{LinkSubscriptionCommand, LinkSubscriptionHandler};
pub use refresh_subscription::RefreshSubscriptionHandler;
pub use unlink_subscription::{UnlinkSubscriptionCommand, UnlinkSubscriptionHandler};
pub use verify_receipt::{VerifiedReceipt, VerifyReceiptCommand, VerifyReceiptHandler};
