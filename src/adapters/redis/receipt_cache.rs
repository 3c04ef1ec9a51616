//! Redis-backed receipt cache.
//!
//! Keys are `iap:receipt:{original_transaction_id}` and expire after the
//! configured TTL. Connection failures surface as `CacheError`; callers
//! treat them as a miss.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::ReceiptCache;

const KEY_PREFIX: &str = "iap:receipt";

#[derive(Clone)]
pub struct RedisReceiptCache {
    conn: MultiplexedConnection,
    ttl_secs: u64,
}

impl RedisReceiptCache {
    pub fn new(conn: MultiplexedConnection, ttl_secs: u64) -> Self {
        Self { conn, ttl_secs }
    }

    fn key(original_transaction_id: &str) -> String {
        format!("{}:{}", KEY_PREFIX, original_transaction_id)
    }
}

fn cache_error(e: redis::RedisError) -> DomainError {
    DomainError::new(ErrorCode::CacheError, format!("Receipt cache unavailable: {}", e))
}

#[async_trait]
impl ReceiptCache for RedisReceiptCache {
    async fn get(&self, original_transaction_id: &str) -> Result<Option<String>, DomainError> {
        let mut conn = self.conn.clone();

        conn.get(Self::key(original_transaction_id))
            .await
            .map_err(|e: redis::RedisError| cache_error(e))
    }

    async fn set(&self, original_transaction_id: &str, receipt: &str) -> Result<(), DomainError> {
        let mut conn = self.conn.clone();

        conn.set_ex::<_, _, ()>(Self::key(original_transaction_id), receipt, self.ttl_secs)
            .await
            .map_err(|e: redis::RedisError| cache_error(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_prefixed_by_transaction_id() {
        assert_eq!(RedisReceiptCache::key("1000"), "iap:receipt:1000");
    }

    // Integration test requires a running Redis instance:
    // #[tokio::test]
    // async fn round_trips_receipt() {
    //     let client = redis::Client::open("redis://127.0.0.1/").unwrap();
    //     let conn = client.get_multiplexed_async_connection().await.unwrap();
    //     let cache = RedisReceiptCache::new(conn, 60);
    //     cache.set("1000", "receipt").await.unwrap();
    //     assert_eq!(cache.get("1000").await.unwrap().as_deref(), Some("receipt"));
    // }
}
