//! Stripe webhook verification and subscription event extraction.
//!
//! A verified event only tells us which subscription changed. The sync
//! handler re-fetches the subscription from Stripe before reconciling, so
//! event ordering does not matter.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Maximum allowed age for webhook events (5 minutes).
const MAX_EVENT_AGE_SECS: i64 = 300;

/// Maximum allowed clock skew for future events (1 minute).
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Errors raised while verifying a Stripe webhook.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("timestamp out of range")]
    TimestampOutOfRange,

    #[error("timestamp in the future")]
    InvalidTimestamp,

    #[error("parse error: {0}")]
    ParseError(String),

    /// Event does not concern a subscription.
    #[error("event ignored: {0}")]
    Ignored(String),
}

/// Parsed `Stripe-Signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    /// Parses `t=<timestamp>,v1=<hex>[,v1=<hex>...]`.
    ///
    /// Stripe sends several `v1` entries while a secret is being rolled.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or_else(|| WebhookError::ParseError("invalid header format".to_string()))?;

            match key {
                "t" => {
                    timestamp = Some(value.parse::<i64>().map_err(|_| {
                        WebhookError::ParseError("invalid timestamp".to_string())
                    })?);
                }
                "v1" => {
                    let sig = hex::decode(value).map_err(|_| {
                        WebhookError::ParseError("invalid v1 signature hex".to_string())
                    })?;
                    v1_signatures.push(sig);
                }
                _ => {}
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| WebhookError::ParseError("missing timestamp".to_string()))?;
        if v1_signatures.is_empty() {
            return Err(WebhookError::ParseError("missing v1 signature".to_string()));
        }

        Ok(Self {
            timestamp,
            v1_signatures,
        })
    }
}

/// Verifies `Stripe-Signature` headers with the endpoint secret.
pub struct StripeWebhookVerifier {
    secret: SecretString,
}

impl StripeWebhookVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Checks the signature and timestamp, then parses the event.
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent, WebhookError> {
        let header = SignatureHeader::parse(signature_header)?;
        validate_timestamp(header.timestamp, chrono::Utc::now().timestamp())?;

        let expected = self.compute_signature(header.timestamp, payload)?;
        if !header
            .v1_signatures
            .iter()
            .any(|sig| constant_time_compare(&expected, sig))
        {
            return Err(WebhookError::InvalidSignature);
        }

        serde_json::from_slice(payload).map_err(|e| WebhookError::ParseError(e.to_string()))
    }

    fn compute_signature(&self, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, WebhookError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| WebhookError::InvalidSignature)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn validate_timestamp(timestamp: i64, now: i64) -> Result<(), WebhookError> {
    let age = now - timestamp;
    if age > MAX_EVENT_AGE_SECS {
        return Err(WebhookError::TimestampOutOfRange);
    }
    if age < -MAX_CLOCK_SKEW_SECS {
        return Err(WebhookError::InvalidTimestamp);
    }
    Ok(())
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

/// Stripe event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub created: i64,
    pub data: StripeEventData,
    #[serde(default)]
    pub livemode: bool,
}

/// Payload carried by a Stripe event.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// Subscription an event points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsEventRef {
    pub subs_id: String,
    pub ftc_user_id: Option<String>,
}

impl StripeEvent {
    /// Extracts the subscription this event concerns.
    ///
    /// `customer.subscription.*` events carry the subscription itself;
    /// `invoice.*` events reference it by id.
    pub fn subscription_ref(&self) -> Result<SubsEventRef, WebhookError> {
        let object = &self.data.object;
        let subs_id = if self.event_type.starts_with("customer.subscription.") {
            object.get("id").and_then(|v| v.as_str())
        } else if self.event_type.starts_with("invoice.") {
            object.get("subscription").and_then(|v| v.as_str())
        } else {
            return Err(WebhookError::Ignored(self.event_type.clone()));
        };

        let subs_id = subs_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| WebhookError::Ignored(format!("{} without subscription", self.id)))?;

        let ftc_user_id = object
            .pointer("/metadata/ftc_user_id")
            .or_else(|| object.pointer("/subscription_details/metadata/ftc_user_id"))
            .and_then(|v| v.as_str())
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        Ok(SubsEventRef {
            subs_id: subs_id.to_string(),
            ftc_user_id,
        })
    }
}

#[cfg(test)]
pub fn compute_test_signature(secret: &str, timestamp: i64, payload: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "whsec_test_secret_12345";

    fn verifier(secret: &str) -> StripeWebhookVerifier {
        StripeWebhookVerifier::new(SecretString::new(secret.to_string()))
    }

    fn subscription_payload() -> String {
        serde_json::json!({
            "id": "evt_1",
            "type": "customer.subscription.updated",
            "created": 1704067200,
            "data": {
                "object": {
                    "id": "sub_123",
                    "status": "active",
                    "metadata": { "ftc_user_id": "ftc-1" }
                }
            },
            "livemode": false
        })
        .to_string()
    }

    #[test]
    fn parse_header_collects_every_v1() {
        let header = format!("t=1234567890,v1={},v1={},v0=ignored", "a".repeat(64), "b".repeat(64));
        let parsed = SignatureHeader::parse(&header).unwrap();
        assert_eq!(parsed.timestamp, 1234567890);
        assert_eq!(parsed.v1_signatures.len(), 2);
    }

    #[test]
    fn parse_header_missing_parts_fails() {
        assert!(matches!(
            SignatureHeader::parse(&format!("v1={}", "a".repeat(64))),
            Err(WebhookError::ParseError(_))
        ));
        assert!(matches!(
            SignatureHeader::parse("t=1234567890"),
            Err(WebhookError::ParseError(_))
        ));
        assert!(matches!(
            SignatureHeader::parse("t=1,v1=zz"),
            Err(WebhookError::ParseError(_))
        ));
    }

    #[test]
    fn verify_valid_signature() {
        let payload = subscription_payload();
        let ts = chrono::Utc::now().timestamp();
        let header = format!("t={},v1={}", ts, compute_test_signature(TEST_SECRET, ts, &payload));

        let event = verifier(TEST_SECRET)
            .verify_and_parse(payload.as_bytes(), &header)
            .unwrap();
        assert_eq!(event.id, "evt_1");
    }

    #[test]
    fn verify_wrong_secret_fails() {
        let payload = subscription_payload();
        let ts = chrono::Utc::now().timestamp();
        let header = format!("t={},v1={}", ts, compute_test_signature(TEST_SECRET, ts, &payload));

        let result = verifier("whsec_other").verify_and_parse(payload.as_bytes(), &header);
        assert_eq!(result.unwrap_err(), WebhookError::InvalidSignature);
    }

    #[test]
    fn verify_tampered_payload_fails() {
        let ts = chrono::Utc::now().timestamp();
        let header = format!(
            "t={},v1={}",
            ts,
            compute_test_signature(TEST_SECRET, ts, r#"{"id":"evt_1"}"#)
        );
        let result = verifier(TEST_SECRET).verify_and_parse(br#"{"id":"evt_2"}"#, &header);
        assert_eq!(result.unwrap_err(), WebhookError::InvalidSignature);
    }

    #[test]
    fn timestamp_window_is_enforced() {
        let now = 1_700_000_000;
        assert!(validate_timestamp(now - 300, now).is_ok());
        assert_eq!(
            validate_timestamp(now - 301, now),
            Err(WebhookError::TimestampOutOfRange)
        );
        assert!(validate_timestamp(now + 30, now).is_ok());
        assert_eq!(
            validate_timestamp(now + 120, now),
            Err(WebhookError::InvalidTimestamp)
        );
    }

    #[test]
    fn constant_time_compare_checks_length() {
        assert!(constant_time_compare(&[1, 2, 3], &[1, 2, 3]));
        assert!(!constant_time_compare(&[1, 2, 3], &[1, 2, 4]));
        assert!(!constant_time_compare(&[1, 2], &[1, 2, 3]));
    }

    #[test]
    fn subscription_event_yields_subs_and_owner() {
        let event: StripeEvent = serde_json::from_str(&subscription_payload()).unwrap();
        let r = event.subscription_ref().unwrap();
        assert_eq!(r.subs_id, "sub_123");
        assert_eq!(r.ftc_user_id.as_deref(), Some("ftc-1"));
    }

    #[test]
    fn invoice_event_references_subscription() {
        let event: StripeEvent = serde_json::from_value(serde_json::json!({
            "id": "evt_2",
            "type": "invoice.payment_succeeded",
            "created": 1704067200,
            "data": { "object": { "id": "in_1", "subscription": "sub_9" } }
        }))
        .unwrap();

        let r = event.subscription_ref().unwrap();
        assert_eq!(r.subs_id, "sub_9");
        assert!(r.ftc_user_id.is_none());
    }

    #[test]
    fn unrelated_event_is_ignored() {
        let event: StripeEvent = serde_json::from_value(serde_json::json!({
            "id": "evt_3",
            "type": "checkout.session.completed",
            "created": 1704067200,
            "data": { "object": {} }
        }))
        .unwrap();

        assert!(matches!(event.subscription_ref(), Err(WebhookError::Ignored(_))));
    }
}
