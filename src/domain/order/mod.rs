//! Alipay/WeChat one-time orders.

mod aggregate;
mod confirm;
mod payment;

pub use aggregate::{Order, OrderKind};
pub use confirm::{ConfirmationBuilder, OrderConfirmed};
pub use payment::{PaymentResult, WebhookPayload};
