//! Streaming discovery ports for the pollers.
//!
//! Candidates arrive on a bounded channel fed by a producer task, so large
//! backlogs are never loaded into memory at once. The channel closes when
//! the underlying query is exhausted. A failed row is sent as an `Err` and
//! does not stop the stream.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::domain::apple::Subscription;
use crate::domain::foundation::DomainError;
use crate::domain::order::{Order, WebhookPayload};

/// Receiving end of a candidate stream.
pub type Candidates<T> = mpsc::Receiver<Result<T, DomainError>>;

/// Source of order poller candidates.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Unconfirmed Alipay/WeChat orders created at or after `since`, in
    /// insertion order.
    async fn stream_unconfirmed(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Candidates<Order>, DomainError>;

    /// Stored provider notification for an order.
    async fn find_webhook(&self, order_id: &str) -> Result<Option<WebhookPayload>, DomainError>;
}

/// Source of IAP poller candidates.
#[async_trait]
pub trait IapRepository: Send + Sync {
    /// Subscriptions whose expiry falls within `[from, until]`, soonest
    /// first. Anything that lapsed before `from` is left alone.
    async fn stream_expiring(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Candidates<Subscription>, DomainError>;

    async fn find_subs(
        &self,
        original_transaction_id: &str,
    ) -> Result<Option<Subscription>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_sources_are_object_safe() {
        fn _orders(_r: &dyn OrderRepository) {}
        fn _iap(_r: &dyn IapRepository) {}
    }
}
