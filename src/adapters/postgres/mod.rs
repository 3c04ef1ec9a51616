//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! This module provides adapters for PostgreSQL-backed persistence:
//! - `PostgresMembershipStore` - Transactional membership writes and row locks
//! - `PostgresOrderRepository` - Unconfirmed order discovery and stored webhooks
//! - `PostgresIapRepository` - Expiring Apple subscription discovery
//! - `PostgresReceiptRepository` - Apple receipt archive
//! - `PostgresPollerLogRepository` - Poller run counters

mod iap_repository;
mod membership_store;
mod order_repository;
mod poller_log_repository;
mod receipt_repository;
mod rows;

pub use iap_repository::PostgresIapRepository;
pub use membership_store::{PostgresMembershipStore, PostgresMembershipTx};
pub use order_repository::PostgresOrderRepository;
pub use poller_log_repository::PostgresPollerLogRepository;
pub use receipt_repository::PostgresReceiptRepository;

/// Channel capacity between a streaming query and its consumer.
const STREAM_BUFFER: usize = 64;
