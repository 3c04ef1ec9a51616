//! Stripe channel: subscription fact, builders and webhook verification.

mod builder;
mod price;
mod subs;
mod webhook;

pub use builder::{CartIntent, SubsResult, SubsSuccessBuilder, SubsSyncBuilder};
pub use price::PriceCatalog;
pub use subs::Subs;
pub use webhook::{
    SignatureHeader, StripeEvent, StripeEventData, StripeWebhookVerifier, SubsEventRef,
    WebhookError,
};

#[cfg(test)]
pub(crate) use subs::fixtures;
#[cfg(test)]
pub use webhook::compute_test_signature;
