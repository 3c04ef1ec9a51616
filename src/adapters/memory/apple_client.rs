//! Scripted Apple client for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::apple::VerificationResponse;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::AppleClient;

/// Returns a fixed response per (receipt, endpoint) pair and records calls.
#[derive(Clone, Default)]
pub struct MockAppleClient {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    responses: HashMap<(String, bool), VerificationResponse>,
    calls: Vec<(String, bool)>,
}

impl MockAppleClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn respond(&self, receipt: &str, sandbox: bool, response: VerificationResponse) {
        self.state()
            .responses
            .insert((receipt.to_string(), sandbox), response);
    }

    /// `(receipt, sandbox)` pairs in call order.
    pub fn calls(&self) -> Vec<(String, bool)> {
        self.state().calls.clone()
    }
}

#[async_trait]
impl AppleClient for MockAppleClient {
    async fn verify_receipt(
        &self,
        receipt: &str,
        sandbox: bool,
    ) -> Result<VerificationResponse, DomainError> {
        let mut state = self.state();
        state.calls.push((receipt.to_string(), sandbox));
        state
            .responses
            .get(&(receipt.to_string(), sandbox))
            .cloned()
            .ok_or_else(|| {
                DomainError::new(ErrorCode::ExternalServiceError, "apple endpoint unreachable")
            })
    }
}
