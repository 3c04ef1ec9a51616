//! FTC Membership - Reconciliation engine for reader memberships
//!
//! This crate keeps one membership row per reader consistent with the
//! channels that pay for it: Stripe subscriptions, Apple in-app purchases
//! and one-time Alipay/WeChat orders.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
