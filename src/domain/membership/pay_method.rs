//! Payment channel a membership was purchased through.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::ValidationError;

/// Channel a membership was paid through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayMethod {
    Alipay,
    Wxpay,
    Stripe,
    Apple,
    B2b,
}

impl PayMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayMethod::Alipay => "alipay",
            PayMethod::Wxpay => "wxpay",
            PayMethod::Stripe => "stripe",
            PayMethod::Apple => "apple",
            PayMethod::B2b => "b2b",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s.to_lowercase().as_str() {
            "alipay" => Ok(PayMethod::Alipay),
            "wxpay" | "wechat" => Ok(PayMethod::Wxpay),
            "stripe" => Ok(PayMethod::Stripe),
            "apple" => Ok(PayMethod::Apple),
            "b2b" => Ok(PayMethod::B2b),
            _ => Err(ValidationError::unknown_value("payment_method", s)),
        }
    }

    /// Alipay and WeChat sell fixed-length, non-renewing purchases.
    pub fn is_one_time(&self) -> bool {
        matches!(self, PayMethod::Alipay | PayMethod::Wxpay)
    }
}

impl std::fmt::Display for PayMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
