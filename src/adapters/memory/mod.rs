//! In-memory adapters for tests and local runs.

mod apple_client;
mod receipt_cache;
mod store;

pub use apple_client::MockAppleClient;
pub use receipt_cache::InMemoryReceiptCache;
pub use store::{InMemoryStore, InMemoryTx};
