//! One-time order handlers.

mod confirm_order;

pub use confirm_order::{ConfirmOrderCommand, ConfirmOrderHandler};
