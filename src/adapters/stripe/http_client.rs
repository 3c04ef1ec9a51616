//! Stripe subscriptions API adapter.
//!
//! Implements the `StripeClient` port over Stripe's form-encoded REST API.
//! Subscription objects are mapped to [`Subs`], resolving the edition from
//! the first item's price through the [`PriceCatalog`].
//!
//! # Security
//!
//! - The API key is held as a `secrecy::SecretString` and only exposed
//!   when building the basic-auth header

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::membership::SubsStatus;
use crate::domain::stripe::{PriceCatalog, Subs};
use crate::ports::{NewSubsParams, StripeClient, UpdateSubsParams};

const DEFAULT_API_BASE: &str = "https://api.stripe.com";

pub struct HttpStripeClient {
    api_key: SecretString,
    api_base_url: String,
    prices: Arc<PriceCatalog>,
    http_client: reqwest::Client,
}

impl HttpStripeClient {
    pub fn new(api_key: SecretString, prices: Arc<PriceCatalog>) -> Self {
        Self {
            api_key,
            api_base_url: DEFAULT_API_BASE.to_string(),
            prices,
            http_client: reqwest::Client::new(),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    fn subs_url(&self, subs_id: Option<&str>) -> String {
        match subs_id {
            Some(id) => format!("{}/v1/subscriptions/{}", self.api_base_url, id),
            None => format!("{}/v1/subscriptions", self.api_base_url),
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder, op: &str) -> Result<Subs, DomainError> {
        let response = request
            .basic_auth(self.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| {
                DomainError::new(ErrorCode::ExternalServiceError, format!("Stripe {} failed: {}", op, e))
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DomainError::new(
                ErrorCode::SubscriptionNotFound,
                format!("Stripe {}: subscription not found", op),
            ));
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(op, %status, error = %error_text, "Stripe API call failed");
            return Err(DomainError::new(
                ErrorCode::ExternalServiceError,
                format!("Stripe API error: {}", error_text),
            )
            .with_detail("status", status.as_u16().to_string()));
        }

        let object: StripeSubscription = response.json().await.map_err(|e| {
            DomainError::new(
                ErrorCode::ExternalServiceError,
                format!("Failed to parse Stripe response: {}", e),
            )
        })?;

        object.into_subs(&self.prices)
    }
}

#[async_trait]
impl StripeClient for HttpStripeClient {
    async fn fetch_subs(&self, subs_id: &str) -> Result<Subs, DomainError> {
        let request = self
            .http_client
            .get(self.subs_url(Some(subs_id)))
            .query(&[("expand[]", "latest_invoice.payment_intent")]);

        self.send(request, "fetch_subs").await
    }

    async fn new_subs(&self, params: &NewSubsParams) -> Result<Subs, DomainError> {
        let mut form = vec![
            ("customer", params.customer_id.clone()),
            ("items[0][price]", params.price_id.clone()),
            ("metadata[ftc_user_id]", params.ftc_user_id.clone()),
            ("payment_behavior", "default_incomplete".to_string()),
            ("expand[]", "latest_invoice.payment_intent".to_string()),
        ];
        if let Some(pm) = &params.default_payment_method {
            form.push(("default_payment_method", pm.clone()));
        }

        let mut request = self.http_client.post(self.subs_url(None)).form(&form);
        if let Some(key) = &params.idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        self.send(request, "new_subs").await
    }

    async fn update_subs(
        &self,
        subs_id: &str,
        params: &UpdateSubsParams,
    ) -> Result<Subs, DomainError> {
        let mut form = vec![("expand[]", "latest_invoice.payment_intent".to_string())];

        if let Some(price_id) = &params.price_id {
            // Swapping the price needs the current item id.
            let current = self.fetch_subs_raw(subs_id).await?;
            let item_id = current.first_item_id().ok_or_else(|| {
                DomainError::new(
                    ErrorCode::ExternalServiceError,
                    format!("Stripe subscription {} has no items", subs_id),
                )
            })?;
            form.push(("items[0][id]", item_id.to_string()));
            form.push(("items[0][price]", price_id.clone()));
            form.push(("proration_behavior", "create_prorations".to_string()));
        }
        if let Some(at_end) = params.cancel_at_period_end {
            form.push(("cancel_at_period_end", at_end.to_string()));
        }

        let mut request = self.http_client.post(self.subs_url(Some(subs_id))).form(&form);
        if let Some(key) = &params.idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        self.send(request, "update_subs").await
    }

    async fn cancel_subs(&self, subs_id: &str, at_period_end: bool) -> Result<Subs, DomainError> {
        if at_period_end {
            let params = UpdateSubsParams {
                cancel_at_period_end: Some(true),
                ..Default::default()
            };
            return self.update_subs(subs_id, &params).await;
        }

        let request = self.http_client.delete(self.subs_url(Some(subs_id)));
        self.send(request, "cancel_subs").await
    }
}

impl HttpStripeClient {
    async fn fetch_subs_raw(&self, subs_id: &str) -> Result<StripeSubscription, DomainError> {
        let response = self
            .http_client
            .get(self.subs_url(Some(subs_id)))
            .basic_auth(self.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| {
                DomainError::new(ErrorCode::ExternalServiceError, format!("Stripe fetch failed: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(DomainError::new(
                ErrorCode::ExternalServiceError,
                format!("Stripe API error: {}", error_text),
            ));
        }

        response.json().await.map_err(|e| {
            DomainError::new(
                ErrorCode::ExternalServiceError,
                format!("Failed to parse Stripe response: {}", e),
            )
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Wire types
// ════════════════════════════════════════════════════════════════════════════════

/// A field Stripe returns either as an id or as the expanded object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Expandable<T> {
    Id(String),
    Object(T),
}

#[derive(Debug, Deserialize)]
struct StripeInvoice {
    id: String,
    payment_intent: Option<Expandable<StripeObjectId>>,
}

#[derive(Debug, Deserialize)]
struct StripeObjectId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripePrice {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeItem {
    id: String,
    price: StripePrice,
}

#[derive(Debug, Default, Deserialize)]
struct StripeItems {
    #[serde(default)]
    data: Vec<StripeItem>,
}

#[derive(Debug, Default, Deserialize)]
struct StripeMetadata {
    ftc_user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeSubscription {
    id: String,
    status: String,
    customer: Expandable<StripeObjectId>,
    current_period_start: i64,
    current_period_end: i64,
    #[serde(default)]
    cancel_at_period_end: bool,
    cancel_at: Option<i64>,
    canceled_at: Option<i64>,
    ended_at: Option<i64>,
    default_payment_method: Option<Expandable<StripeObjectId>>,
    latest_invoice: Option<Expandable<StripeInvoice>>,
    #[serde(default)]
    items: StripeItems,
    #[serde(default)]
    metadata: StripeMetadata,
    created: i64,
}

impl<T> Expandable<T> {
    fn id_with(self, f: impl FnOnce(T) -> String) -> String {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object(o) => f(o),
        }
    }
}

impl StripeSubscription {
    fn first_item_id(&self) -> Option<&str> {
        self.items.data.first().map(|i| i.id.as_str())
    }

    fn into_subs(self, prices: &PriceCatalog) -> Result<Subs, DomainError> {
        let price_id = self
            .items
            .data
            .first()
            .map(|i| i.price.id.clone())
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::ExternalServiceError,
                    format!("Stripe subscription {} has no items", self.id),
                )
            })?;

        let edition = prices.edition(&price_id).ok_or_else(|| {
            DomainError::validation("price_id", format!("unknown stripe price {}", price_id))
        })?;

        let status = SubsStatus::parse(&self.status).map_err(DomainError::from)?;

        let (latest_invoice_id, payment_intent_id) = match self.latest_invoice {
            None => (None, None),
            Some(Expandable::Id(id)) => (Some(id), None),
            Some(Expandable::Object(invoice)) => (
                Some(invoice.id),
                invoice.payment_intent.map(|p| p.id_with(|o| o.id)),
            ),
        };

        Ok(Subs {
            edition,
            price_id,
            status,
            current_period_start: from_unix("current_period_start", self.current_period_start)?,
            current_period_end: from_unix("current_period_end", self.current_period_end)?,
            cancel_at_period_end: self.cancel_at_period_end,
            cancel_at: self.cancel_at.map(|t| from_unix("cancel_at", t)).transpose()?,
            canceled_utc: self.canceled_at.map(|t| from_unix("canceled_at", t)).transpose()?,
            ended_utc: self.ended_at.map(|t| from_unix("ended_at", t)).transpose()?,
            customer_id: self.customer.id_with(|c| c.id),
            default_payment_method: self.default_payment_method.map(|p| p.id_with(|o| o.id)),
            latest_invoice_id,
            payment_intent_id,
            ftc_user_id: self.metadata.ftc_user_id.filter(|s| !s.is_empty()),
            is_from_stripe: true,
            created_utc: from_unix("created", self.created)?,
            id: self.id,
        })
    }
}

fn from_unix(field: &str, secs: i64) -> Result<DateTime<Utc>, DomainError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| DomainError::validation(field, format!("out of range: {}", secs)))
}
