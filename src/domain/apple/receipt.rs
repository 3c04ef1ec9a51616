//! Apple `verifyReceipt` response.
//!
//! Apple encodes numbers and timestamps as strings; everything optional is
//! defaulted so older response shapes still parse.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, ErrorCode};

use super::{edition_for_product, Environment, Subscription};

/// Receipt is valid.
pub const STATUS_OK: i64 = 0;
/// Receipt is valid but the subscription has expired.
pub const STATUS_EXPIRED: i64 = 21006;
/// Sandbox receipt sent to the production endpoint.
pub const STATUS_SANDBOX_RECEIPT: i64 = 21007;

/// One transaction in a verified receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptInfo {
    pub product_id: String,
    pub transaction_id: String,
    pub original_transaction_id: String,
    pub purchase_date_ms: String,
    pub expires_date_ms: String,
    pub cancellation_date_ms: Option<String>,
}

impl ReceiptInfo {
    fn expires_ms(&self) -> i64 {
        self.expires_date_ms.parse().unwrap_or(0)
    }
}

/// Renewal intent Apple reports for a subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PendingRenewal {
    pub original_transaction_id: String,
    pub product_id: String,
    pub auto_renew_product_id: String,
    pub auto_renew_status: String,
}

/// Body returned by Apple's `verifyReceipt` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationResponse {
    pub status: i64,
    pub environment: String,
    pub latest_receipt: String,
    pub latest_receipt_info: Vec<ReceiptInfo>,
    pub pending_renewal_info: Vec<PendingRenewal>,
}

impl VerificationResponse {
    /// Apple wants the receipt resent to the sandbox endpoint.
    pub fn is_sandbox_redirect(&self) -> bool {
        self.status == STATUS_SANDBOX_RECEIPT
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        match self.status {
            STATUS_OK | STATUS_EXPIRED => Ok(()),
            status => Err(DomainError::new(
                ErrorCode::ExternalServiceError,
                format!("apple rejected receipt with status {}", status),
            )
            .with_detail("status", status.to_string())),
        }
    }

    /// Transaction with the furthest expiry.
    pub fn latest_transaction(&self) -> Option<&ReceiptInfo> {
        self.latest_receipt_info.iter().max_by_key(|r| r.expires_ms())
    }

    /// Builds the subscription described by the latest transaction.
    pub fn subscription(&self) -> Result<Subscription, DomainError> {
        self.validate()?;

        let latest = self.latest_transaction().ok_or_else(|| {
            DomainError::new(ErrorCode::ReceiptNotFound, "receipt has no transactions")
        })?;

        let edition = edition_for_product(&latest.product_id).ok_or_else(|| {
            DomainError::validation(
                "product_id",
                format!("unknown apple product {}", latest.product_id),
            )
        })?;

        let auto_renewal = self
            .pending_renewal_info
            .iter()
            .find(|p| p.original_transaction_id == latest.original_transaction_id)
            .map(|p| p.auto_renew_status == "1")
            .unwrap_or(false);

        let environment = Environment::parse(&self.environment).map_err(DomainError::from)?;

        // A refunded transaction ends the entitlement at cancellation time.
        let expires_ms = latest
            .cancellation_date_ms
            .as_deref()
            .and_then(|ms| ms.parse::<i64>().ok())
            .unwrap_or_else(|| latest.expires_ms());

        Ok(Subscription {
            environment,
            original_transaction_id: latest.original_transaction_id.clone(),
            last_transaction_id: latest.transaction_id.clone(),
            product_id: latest.product_id.clone(),
            edition,
            purchase_date_utc: parse_millis("purchase_date_ms", &latest.purchase_date_ms)?,
            expires_date_utc: millis_to_utc("expires_date_ms", expires_ms)?,
            auto_renewal,
            ftc_user_id: None,
            updated_utc: Utc::now(),
        })
    }
}

fn parse_millis(field: &str, value: &str) -> Result<DateTime<Utc>, DomainError> {
    let ms = value
        .parse::<i64>()
        .map_err(|_| DomainError::validation(field, format!("not a timestamp: {}", value)))?;
    millis_to_utc(field, ms)
}

fn millis_to_utc(field: &str, ms: i64) -> Result<DateTime<Utc>, DomainError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| DomainError::validation(field, format!("out of range: {}", ms)))
}
