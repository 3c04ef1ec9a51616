//! Apple In-App Purchase channel.

mod link;
mod product;
mod receipt;
mod subscription;

pub use link::{LinkBuilder, LinkResult, UnlinkBuilder, UnlinkResult};
pub use product::edition_for_product;
pub use receipt::{
    PendingRenewal, ReceiptInfo, VerificationResponse, STATUS_EXPIRED, STATUS_OK,
    STATUS_SANDBOX_RECEIPT,
};
pub use subscription::{Environment, Subscription};

#[cfg(test)]
pub(crate) use subscription::fixtures;
