//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the reconciliation core to external systems:
//! - `postgres` - Membership store and poller repositories
//! - `redis` - Receipt cache
//! - `stripe` - Stripe subscriptions API
//! - `apple` - Apple receipt verification
//! - `memory` - In-memory doubles for tests and local runs

pub mod apple;
pub mod memory;
pub mod postgres;
pub mod redis;
pub mod stripe;

pub use apple::HttpAppleClient;
pub use memory::{InMemoryReceiptCache, InMemoryStore, MockAppleClient};
pub use postgres::{
    PostgresIapRepository, PostgresMembershipStore, PostgresOrderRepository,
    PostgresPollerLogRepository, PostgresReceiptRepository,
};
pub use self::redis::RedisReceiptCache;
pub use stripe::{HttpStripeClient, MockStripeClient};
