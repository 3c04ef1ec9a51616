//! Redis adapters.

mod receipt_cache;

pub use receipt_cache::RedisReceiptCache;
