use async_trait::async_trait;

use crate::domain::apple::VerificationResponse;
use crate::domain::foundation::DomainError;

/// Apple `verifyReceipt` endpoint.
#[async_trait]
pub trait AppleClient: Send + Sync {
    /// Sends a base64 receipt to the production or sandbox endpoint.
    ///
    /// Returns Apple's response as is, including non-zero statuses.
    async fn verify_receipt(
        &self,
        receipt: &str,
        sandbox: bool,
    ) -> Result<VerificationResponse, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apple_client_is_object_safe() {
        fn _accepts_dyn(_client: &dyn AppleClient) {}
    }
}
