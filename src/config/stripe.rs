//! Stripe configuration
//!
//! Price ids are deployment specific. Each configured price maps to one
//! edition in the [`PriceCatalog`] handed to the Stripe adapter.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::membership::Edition;
use crate::domain::stripe::PriceCatalog;

use super::error::ValidationError;

/// Stripe configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StripeConfig {
    /// Secret API key (sk_test_... or sk_live_...)
    pub api_key: SecretString,

    /// Webhook signing secret (whsec_...)
    pub webhook_secret: SecretString,

    pub price_standard_month: Option<String>,
    pub price_standard_year: Option<String>,
    pub price_premium_year: Option<String>,
}

impl StripeConfig {
    /// Check if using live mode (sk_live_ key)
    pub fn is_live_mode(&self) -> bool {
        self.api_key.expose_secret().starts_with("sk_live_")
    }

    /// Price catalog built from the configured price ids
    pub fn price_catalog(&self) -> PriceCatalog {
        PriceCatalog::new(
            [
                (&self.price_standard_month, Edition::STANDARD_MONTH),
                (&self.price_standard_year, Edition::STANDARD_YEAR),
                (&self.price_premium_year, Edition::PREMIUM_YEAR),
            ]
            .into_iter()
            .filter_map(|(id, edition)| id.clone().map(|id| (id, edition))),
        )
    }

    /// Validate Stripe configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let api_key = self.api_key.expose_secret();
        let webhook_secret = self.webhook_secret.expose_secret();

        if api_key.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_API_KEY"));
        }
        if webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_WEBHOOK_SECRET"));
        }
        if !api_key.starts_with("sk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        if self.price_catalog().is_empty() {
            return Err(ValidationError::NoStripePrices);
        }
        Ok(())
    }
}
