//! Membership domain module.
//!
//! The single entitlement record per reader and the pure rules that decide
//! how channel facts may change it.
//!
//! # Module Structure
//!
//! - `tier` - Tier, Cycle and Edition
//! - `pay_method` - Payment channels
//! - `status` - Stripe subscription status
//! - `addon` - Reserved days and carry-over invoices
//! - `aggregate` - Membership entity
//! - `snapshot` - Archival copies and change lineage
//! - `errors` - ReconcileError and business denials
//! - `issue` - Recorded invariant violations
//! - `permit` - Stripe permission guards
//! - `merge` - Cross-channel Apple merge

mod addon;
mod aggregate;
mod errors;
mod issue;
mod merge;
mod pay_method;
mod permit;
mod snapshot;
mod status;
mod tier;

pub use addon::{AddOn, CarryOverInvoice};
pub use aggregate::{today, Membership};
pub use errors::{Denial, ReconcileError};
pub use issue::ReconcileIssue;
pub use merge::merge_iap_membership;
pub use pay_method::PayMethod;
pub use permit::{permit_stripe_create, permit_stripe_upgrade};
pub use snapshot::{ArchiveReason, MemberSnapshot, Versioned};
pub use status::SubsStatus;
pub use tier::{Cycle, Edition, Tier};
