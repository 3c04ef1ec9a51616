//! Mock Stripe client for testing.
//!
//! Holds subscriptions in memory and applies updates the way Stripe would
//! for the fields the reconciliation engine reads. Supports error injection
//! and call tracking.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::membership::SubsStatus;
use crate::domain::stripe::{PriceCatalog, Subs};
use crate::ports::{NewSubsParams, StripeClient, UpdateSubsParams};

#[derive(Clone, Default)]
pub struct MockStripeClient {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    subscriptions: HashMap<String, Subs>,
    next_new: Option<Subs>,
    next_error: Option<DomainError>,
    prices: Option<PriceCatalog>,
    calls: Vec<String>,
}

impl MockStripeClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Resolves editions when an update swaps the price.
    pub fn with_prices(self, prices: PriceCatalog) -> Self {
        self.state().prices = Some(prices);
        self
    }

    /// Registers a subscription returned by `fetch_subs`.
    pub fn insert(&self, subs: Subs) {
        self.state().subscriptions.insert(subs.id.clone(), subs);
    }

    /// Subscription returned by the next `new_subs`.
    pub fn set_next_new(&self, subs: Subs) {
        self.state().next_new = Some(subs);
    }

    /// Fails the next call with `err`.
    pub fn set_error(&self, err: DomainError) {
        self.state().next_error = Some(err);
    }

    /// Method names in call order.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    fn begin(&self, method: &str) -> Result<MutexGuard<'_, MockState>, DomainError> {
        let mut state = self.state();
        state.calls.push(method.to_string());
        match state.next_error.take() {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }
}

fn not_found(subs_id: &str) -> DomainError {
    DomainError::new(
        ErrorCode::SubscriptionNotFound,
        format!("Stripe subscription not found: {}", subs_id),
    )
}

#[async_trait]
impl StripeClient for MockStripeClient {
    async fn fetch_subs(&self, subs_id: &str) -> Result<Subs, DomainError> {
        let state = self.begin("fetch_subs")?;
        state
            .subscriptions
            .get(subs_id)
            .cloned()
            .ok_or_else(|| not_found(subs_id))
    }

    async fn new_subs(&self, params: &NewSubsParams) -> Result<Subs, DomainError> {
        let mut state = self.begin("new_subs")?;
        let mut subs = state.next_new.take().ok_or_else(|| {
            DomainError::new(ErrorCode::ExternalServiceError, "no subscription configured")
        })?;
        subs.customer_id = params.customer_id.clone();
        subs.ftc_user_id = Some(params.ftc_user_id.clone());
        state.subscriptions.insert(subs.id.clone(), subs.clone());
        Ok(subs)
    }

    async fn update_subs(
        &self,
        subs_id: &str,
        params: &UpdateSubsParams,
    ) -> Result<Subs, DomainError> {
        let mut state = self.begin("update_subs")?;
        let edition = match &params.price_id {
            Some(price_id) => Some(
                state
                    .prices
                    .as_ref()
                    .and_then(|p| p.edition(price_id))
                    .ok_or_else(|| {
                        DomainError::validation("price_id", format!("unknown stripe price {}", price_id))
                    })?,
            ),
            None => None,
        };

        let subs = state
            .subscriptions
            .get_mut(subs_id)
            .ok_or_else(|| not_found(subs_id))?;
        if let (Some(price_id), Some(edition)) = (&params.price_id, edition) {
            subs.price_id = price_id.clone();
            subs.edition = edition;
        }
        if let Some(at_end) = params.cancel_at_period_end {
            subs.cancel_at_period_end = at_end;
        }
        Ok(subs.clone())
    }

    async fn cancel_subs(&self, subs_id: &str, at_period_end: bool) -> Result<Subs, DomainError> {
        let mut state = self.begin("cancel_subs")?;
        let subs = state
            .subscriptions
            .get_mut(subs_id)
            .ok_or_else(|| not_found(subs_id))?;
        if at_period_end {
            subs.cancel_at_period_end = true;
        } else {
            let now = Utc::now();
            subs.status = SubsStatus::Canceled;
            subs.canceled_utc = Some(now);
            subs.ended_utc = Some(now);
        }
        Ok(subs.clone())
    }
}
