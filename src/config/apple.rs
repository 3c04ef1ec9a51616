//! Apple receipt verification configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

/// Apple receipt verification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppleConfig {
    /// App-specific shared secret sent with every verification request
    pub shared_secret: SecretString,
}

impl AppleConfig {
    /// Validate Apple configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.shared_secret.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("APPLE_SHARED_SECRET"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_empty_secret() {
        let config = AppleConfig {
            shared_secret: SecretString::new(String::new()),
        };
        assert!(config.validate().is_err());
    }
}
