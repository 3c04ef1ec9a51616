//! Application handlers.
//!
//! Each handler opens one transaction, locks the rows it reads, runs a
//! domain builder and persists the outcome. Builders never write; handlers
//! roll back on any error.

pub mod apple;
pub mod order;
pub mod stripe;

mod persist;
