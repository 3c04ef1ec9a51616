//! Stripe subscriptions adapter.
//!
//! Implements the `StripeClient` port:
//! - `HttpStripeClient` - Stripe REST API
//! - `MockStripeClient` - In-memory double for tests
//!
//! # Configuration
//!
//! Required environment variables:
//! - `FTC_MEMBERSHIP__STRIPE__API_KEY`: Stripe secret API key
//! - `FTC_MEMBERSHIP__STRIPE__WEBHOOK_SECRET`: Webhook signing secret (whsec_...)

mod http_client;
mod mock_client;

pub use http_client::HttpStripeClient;
pub use mock_client::MockStripeClient;
