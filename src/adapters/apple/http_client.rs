//! Apple `verifyReceipt` adapter.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::domain::apple::VerificationResponse;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::AppleClient;

const PRODUCTION_URL: &str = "https://buy.itunes.apple.com/verifyReceipt";
const SANDBOX_URL: &str = "https://sandbox.itunes.apple.com/verifyReceipt";

#[derive(Serialize)]
struct VerifyRequest<'a> {
    #[serde(rename = "receipt-data")]
    receipt_data: &'a str,
    password: &'a str,
    #[serde(rename = "exclude-old-transactions")]
    exclude_old_transactions: bool,
}

pub struct HttpAppleClient {
    shared_secret: SecretString,
    production_url: String,
    sandbox_url: String,
    http_client: reqwest::Client,
}

impl HttpAppleClient {
    pub fn new(shared_secret: SecretString) -> Self {
        Self {
            shared_secret,
            production_url: PRODUCTION_URL.to_string(),
            sandbox_url: SANDBOX_URL.to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    /// Point both endpoints somewhere else (for testing).
    pub fn with_urls(mut self, production: impl Into<String>, sandbox: impl Into<String>) -> Self {
        self.production_url = production.into();
        self.sandbox_url = sandbox.into();
        self
    }
}

#[async_trait]
impl AppleClient for HttpAppleClient {
    async fn verify_receipt(
        &self,
        receipt: &str,
        sandbox: bool,
    ) -> Result<VerificationResponse, DomainError> {
        let url = if sandbox { &self.sandbox_url } else { &self.production_url };

        let body = VerifyRequest {
            receipt_data: receipt,
            password: self.shared_secret.expose_secret(),
            exclude_old_transactions: false,
        };

        let response = self
            .http_client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::ExternalServiceError,
                    format!("Apple receipt verification failed: {}", e),
                )
            })?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(%status, sandbox, "Apple verifyReceipt returned HTTP error");
            return Err(DomainError::new(
                ErrorCode::ExternalServiceError,
                format!("Apple verifyReceipt HTTP {}", status),
            ));
        }

        response.json().await.map_err(|e| {
            DomainError::new(
                ErrorCode::ExternalServiceError,
                format!("Failed to parse Apple response: {}", e),
            )
        })
    }
}
