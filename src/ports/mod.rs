//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the reconciliation core and the outside world. Adapters implement them.
//!
//! ## Persistence
//!
//! - `MembershipStore` / `MembershipTx` - Transactional membership writes
//! - `OrderRepository`, `IapRepository` - Streaming poller discovery
//! - `ReceiptRepository`, `ReceiptCache` - Apple receipts
//! - `PollerLogRepository` - Poller run counters
//!
//! ## Providers
//!
//! - `StripeClient` - Stripe subscriptions API
//! - `AppleClient` - Apple receipt verification

mod apple_client;
mod candidate_source;
mod membership_store;
mod poller_log_repository;
mod receipt_store;
mod stripe_client;

pub use apple_client::AppleClient;
pub use candidate_source::{Candidates, IapRepository, OrderRepository};
pub use membership_store::{MembershipStore, MembershipTx};
pub use poller_log_repository::{PollerKind, PollerLog, PollerLogRepository};
pub use receipt_store::{ReceiptCache, ReceiptRepository};
pub use stripe_client::{NewSubsParams, StripeClient, UpdateSubsParams};
