//! Reserved day-grants and the invoices that carry them between channels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::InvoiceId;

use super::{PayMethod, Tier};

/// Days reserved per tier when paid time moves between channels.
///
/// The reserve rides along on the membership and survives every rebuild.
/// Nothing in this crate converts it into `expire_date`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOn {
    pub standard_days: i64,
    pub premium_days: i64,
}

impl AddOn {
    pub fn new(standard_days: i64, premium_days: i64) -> Self {
        Self {
            standard_days,
            premium_days,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.standard_days == 0 && self.premium_days == 0
    }

    /// Returns a copy with `days` added to `tier`'s reserve.
    pub fn plus(self, tier: Tier, days: i64) -> Self {
        match tier {
            Tier::Standard => Self {
                standard_days: self.standard_days + days,
                ..self
            },
            Tier::Premium => Self {
                premium_days: self.premium_days + days,
                ..self
            },
        }
    }
}

/// Unused entitlement converted into a portable day-grant at channel switch.
///
/// Lifecycle: created by a builder, applied to the next membership's
/// [`AddOn`] in the same step and stamped `consumed_utc`. A consumed invoice
/// is never applied again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarryOverInvoice {
    pub id: InvoiceId,
    pub compound_id: String,
    pub tier: Tier,
    pub days: i64,
    /// Channel the days were taken from.
    pub source: Option<PayMethod>,
    pub created_utc: DateTime<Utc>,
    pub consumed_utc: Option<DateTime<Utc>>,
}

impl CarryOverInvoice {
    pub fn new(
        compound_id: impl Into<String>,
        tier: Tier,
        days: i64,
        source: Option<PayMethod>,
    ) -> Self {
        Self {
            id: InvoiceId::new(),
            compound_id: compound_id.into(),
            tier,
            days,
            source,
            created_utc: Utc::now(),
            consumed_utc: None,
        }
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed_utc.is_some()
    }

    /// Applies the grant to `add_on`, retiring the invoice.
    ///
    /// Returns `add_on` unchanged if the invoice was already consumed.
    pub fn consume(&mut self, add_on: AddOn) -> AddOn {
        if self.is_consumed() {
            return add_on;
        }
        self.consumed_utc = Some(Utc::now());
        add_on.plus(self.tier, self.days)
    }
}
