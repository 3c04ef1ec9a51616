//! Background pollers.
//!
//! - `OrderPoller` - Applies stored Alipay/WeChat webhooks
//! - `IapPoller` - Re-verifies Apple subscriptions near expiry
//!
//! Both discover candidates through a streaming port and process them on a
//! `Scheduler`. Overlapping runs of the same poller are not guarded
//! against; row locks keep concurrent runs correct.

mod iap;
mod order;
mod scheduler;

pub use iap::IapPoller;
pub use order::OrderPoller;
pub use scheduler::{Schedule, Scheduler};
