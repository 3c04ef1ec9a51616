//! Stripe API port.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::stripe::Subs;

/// Parameters for a new subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubsParams {
    pub customer_id: String,
    pub price_id: String,
    pub ftc_user_id: String,
    pub default_payment_method: Option<String>,
    /// Makes retried requests safe.
    pub idempotency_key: Option<String>,
}

/// Changes to an existing subscription. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSubsParams {
    pub price_id: Option<String>,
    pub cancel_at_period_end: Option<bool>,
    pub idempotency_key: Option<String>,
}

/// Stripe subscription operations.
#[async_trait]
pub trait StripeClient: Send + Sync {
    async fn fetch_subs(&self, subs_id: &str) -> Result<Subs, DomainError>;

    async fn new_subs(&self, params: &NewSubsParams) -> Result<Subs, DomainError>;

    async fn update_subs(
        &self,
        subs_id: &str,
        params: &UpdateSubsParams,
    ) -> Result<Subs, DomainError>;

    /// Cancels now, or at period end when `at_period_end` is true.
    async fn cancel_subs(&self, subs_id: &str, at_period_end: bool) -> Result<Subs, DomainError>;
}
