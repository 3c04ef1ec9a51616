//! Domain layer containing reconciliation rules and domain types.
//!
//! Nothing in here performs I/O.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, errors)
//! - `membership` - Membership entity, guards and cross-channel merge
//! - `stripe` - Stripe subscription fact and builders
//! - `apple` - Apple subscription fact, receipts and link builders
//! - `order` - One-time orders and their confirmation

pub mod apple;
pub mod foundation;
pub mod membership;
pub mod order;
pub mod stripe;
