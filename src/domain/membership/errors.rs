//! Reconciliation error types.
//!
//! # Taxonomy
//!
//! | Variant | Meaning | Logged |
//! |---------|---------|--------|
//! | Denied | Expected business-rule refusal, user facing | debug |
//! | Inconsistent | Stored data violates an invariant | error, recorded |
//! | External | Provider or network failure, retryable | warn |
//! | UnknownState | State the builders have no rule for | error |
//! | NotFound | Required row or receipt missing | warn |
//! | Infrastructure | Store failure | error |

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode};

use super::Membership;

/// Business-rule denials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Denial {
    /// A valid membership from another channel blocks a new Stripe subscription.
    NonStripeValidSub,
    /// A Stripe subscription is still running.
    ActiveStripeSub,
    /// The Apple subscription is already bound to another FTC account.
    IapAlreadyLinked,
    /// The FTC account is bound to another Apple subscription.
    FtcAlreadyLinked,
    /// The FTC account holds a valid non-Apple membership.
    FtcMemberValid,
    /// Linking would bind one Apple subscription to two FTC accounts.
    LinkToMultipleFtc,
    /// The target membership is bound to another Apple subscription.
    TargetLinkedToOtherIap,
    /// The target membership is valid and did not come from Apple.
    HasValidNonIapMember,
    /// Membership is not an active standard Stripe subscription.
    NotUpgradable,
    /// The FTC account is not bound to this Apple subscription.
    IapNotLinked,
    /// Payment provider does not report the order as paid.
    OrderNotPaid,
    /// Paid amount differs from the order amount.
    AmountMismatch,
}

impl Denial {
    /// Field the denial is reported against.
    pub fn field(&self) -> &'static str {
        match self {
            Denial::NonStripeValidSub | Denial::ActiveStripeSub | Denial::NotUpgradable => {
                "membership"
            }
            Denial::IapAlreadyLinked
            | Denial::LinkToMultipleFtc
            | Denial::IapNotLinked => "iap_membership",
            Denial::FtcAlreadyLinked
            | Denial::FtcMemberValid
            | Denial::TargetLinkedToOtherIap
            | Denial::HasValidNonIapMember => "ftc_membership",
            Denial::OrderNotPaid | Denial::AmountMismatch => "order",
        }
    }

    /// Machine-readable code paired with [`Denial::field`].
    pub fn code(&self) -> &'static str {
        match self {
            Denial::NonStripeValidSub => "non_stripe_valid_sub",
            Denial::ActiveStripeSub => "active_stripe_sub",
            Denial::IapAlreadyLinked => "iap_already_linked",
            Denial::FtcAlreadyLinked => "ftc_already_linked",
            Denial::FtcMemberValid => "ftc_member_valid",
            Denial::LinkToMultipleFtc => "link_to_multiple_ftc",
            Denial::TargetLinkedToOtherIap => "target_linked_to_other_iap",
            Denial::HasValidNonIapMember => "has_valid_non_iap_member",
            Denial::NotUpgradable => "not_upgradable",
            Denial::IapNotLinked => "iap_not_linked",
            Denial::OrderNotPaid => "order_not_paid",
            Denial::AmountMismatch => "amount_mismatch",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Denial::NonStripeValidSub => "a valid membership from another channel exists",
            Denial::ActiveStripeSub => "a Stripe subscription is still active",
            Denial::IapAlreadyLinked => "apple subscription is already linked to another account",
            Denial::FtcAlreadyLinked => "account is already linked to another apple subscription",
            Denial::FtcMemberValid => "account holds a valid membership",
            Denial::LinkToMultipleFtc => "apple subscription cannot be linked to multiple accounts",
            Denial::TargetLinkedToOtherIap => "target membership is linked to another apple subscription",
            Denial::HasValidNonIapMember => "target membership is valid and not from apple",
            Denial::NotUpgradable => "membership cannot be upgraded",
            Denial::IapNotLinked => "account is not linked to this apple subscription",
            Denial::OrderNotPaid => "order is not paid",
            Denial::AmountMismatch => "paid amount does not match order amount",
        }
    }
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Errors produced while reconciling a channel fact into a membership.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("{0}")]
    Denied(Denial),

    #[error("inconsistent membership: {message}")]
    Inconsistent {
        message: String,
        stripe_side: Box<Membership>,
        user_side: Box<Membership>,
    },

    #[error("external service error: {0}")]
    External(String),

    #[error("unknown subscription state: {0}")]
    UnknownState(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl ReconcileError {
    pub fn inconsistent(
        message: impl Into<String>,
        stripe_side: Membership,
        user_side: Membership,
    ) -> Self {
        ReconcileError::Inconsistent {
            message: message.into(),
            stripe_side: Box::new(stripe_side),
            user_side: Box::new(user_side),
        }
    }

    pub fn external(message: impl Into<String>) -> Self {
        ReconcileError::External(message.into())
    }

    pub fn unknown_state(message: impl Into<String>) -> Self {
        ReconcileError::UnknownState(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ReconcileError::NotFound(message.into())
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        ReconcileError::Infrastructure(message.into())
    }

    pub fn denial(&self) -> Option<Denial> {
        match self {
            ReconcileError::Denied(d) => Some(*d),
            _ => None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ReconcileError::Denied(d) => match d {
                Denial::IapAlreadyLinked
                | Denial::FtcAlreadyLinked
                | Denial::LinkToMultipleFtc
                | Denial::TargetLinkedToOtherIap => ErrorCode::AlreadyLinked,
                Denial::IapNotLinked => ErrorCode::NotLinked,
                Denial::OrderNotPaid | Denial::AmountMismatch => ErrorCode::PaymentRequired,
                Denial::NotUpgradable => ErrorCode::InvalidStateTransition,
                Denial::NonStripeValidSub
                | Denial::ActiveStripeSub
                | Denial::FtcMemberValid
                | Denial::HasValidNonIapMember => ErrorCode::AlreadyExists,
            },
            ReconcileError::Inconsistent { .. } => ErrorCode::DataInconsistency,
            ReconcileError::External(_) => ErrorCode::ExternalServiceError,
            ReconcileError::UnknownState(_) => ErrorCode::UnknownState,
            ReconcileError::NotFound(_) => ErrorCode::MembershipNotFound,
            ReconcileError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns true if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReconcileError::External(_) | ReconcileError::Infrastructure(_)
        )
    }
}

impl From<Denial> for ReconcileError {
    fn from(denial: Denial) -> Self {
        ReconcileError::Denied(denial)
    }
}

impl From<DomainError> for ReconcileError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ExternalServiceError | ErrorCode::CacheError => {
                ReconcileError::External(err.to_string())
            }
            ErrorCode::MembershipNotFound
            | ErrorCode::OrderNotFound
            | ErrorCode::ReceiptNotFound
            | ErrorCode::SubscriptionNotFound => ReconcileError::NotFound(err.to_string()),
            ErrorCode::UnknownState => ReconcileError::UnknownState(err.to_string()),
            _ => ReconcileError::Infrastructure(err.to_string()),
        }
    }
}

impl From<ReconcileError> for DomainError {
    fn from(err: ReconcileError) -> Self {
        match &err {
            ReconcileError::Denied(d) => DomainError::validation(d.field(), d.message())
                .with_detail("code", d.code()),
            ReconcileError::Inconsistent {
                stripe_side,
                user_side,
                ..
            } => DomainError::new(err.code(), err.to_string())
                .with_detail("stripe_side", stripe_side.compound_id())
                .with_detail("user_side", user_side.compound_id()),
            _ => DomainError::new(err.code(), err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserIds;

    #[test]
    fn denial_converts_to_validation_error_with_field_and_code() {
        let err: DomainError = ReconcileError::Denied(Denial::IapAlreadyLinked).into();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.details.get("field").map(String::as_str), Some("iap_membership"));
        assert_eq!(err.details.get("code").map(String::as_str), Some("iap_already_linked"));
    }

    #[test]
    fn inconsistent_carries_both_sides() {
        let a = Membership {
            user_ids: UserIds::ftc("ftc-a"),
            ..Default::default()
        };
        let b = Membership {
            user_ids: UserIds::ftc("ftc-b"),
            ..Default::default()
        };
        let err = ReconcileError::inconsistent("owner mismatch", a, b);
        assert_eq!(err.code(), ErrorCode::DataInconsistency);

        let domain: DomainError = err.into();
        assert_eq!(domain.details.get("stripe_side").map(String::as_str), Some("ftc-a"));
        assert_eq!(domain.details.get("user_side").map(String::as_str), Some("ftc-b"));
    }

    #[test]
    fn only_external_and_infrastructure_are_retryable() {
        assert!(ReconcileError::external("timeout").is_retryable());
        assert!(ReconcileError::infrastructure("pool closed").is_retryable());
        assert!(!ReconcileError::Denied(Denial::ActiveStripeSub).is_retryable());
        assert!(!ReconcileError::unknown_state("gap").is_retryable());
    }

    #[test]
    fn domain_error_maps_external_codes() {
        let err: ReconcileError =
            DomainError::new(ErrorCode::ExternalServiceError, "stripe 503").into();
        assert!(matches!(err, ReconcileError::External(_)));

        let err: ReconcileError = DomainError::database("deadlock").into();
        assert!(matches!(err, ReconcileError::Infrastructure(_)));
    }

    #[test]
    fn every_denial_has_field_and_code() {
        let all = [
            Denial::NonStripeValidSub,
            Denial::ActiveStripeSub,
            Denial::IapAlreadyLinked,
            Denial::FtcAlreadyLinked,
            Denial::FtcMemberValid,
            Denial::LinkToMultipleFtc,
            Denial::TargetLinkedToOtherIap,
            Denial::HasValidNonIapMember,
            Denial::NotUpgradable,
            Denial::IapNotLinked,
            Denial::OrderNotPaid,
            Denial::AmountMismatch,
        ];
        for d in all {
            assert!(!d.field().is_empty());
            assert!(!d.code().is_empty());
        }
    }
}
