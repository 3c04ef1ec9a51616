//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ValidationError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(
    /// Identifier of an archived membership snapshot or version row.
    SnapshotId
);

uuid_id!(
    /// Identifier of a carry-over invoice.
    InvoiceId
);

uuid_id!(
    /// Identifier of a recorded reconciliation issue.
    IssueId
);

/// Reader identity: FTC account id and/or WeChat union id.
///
/// A reader may have signed up with email (FTC id only), with WeChat
/// (union id only) or have both accounts linked. The compound id is the
/// canonical key under which a membership is stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserIds {
    pub ftc_id: Option<String>,
    pub union_id: Option<String>,
}

impl UserIds {
    /// Creates user ids, requiring at least one non-empty id.
    pub fn new(
        ftc_id: Option<String>,
        union_id: Option<String>,
    ) -> Result<Self, ValidationError> {
        let ftc_id = ftc_id.filter(|s| !s.is_empty());
        let union_id = union_id.filter(|s| !s.is_empty());
        if ftc_id.is_none() && union_id.is_none() {
            return Err(ValidationError::empty_field("compound_id"));
        }
        Ok(Self { ftc_id, union_id })
    }

    /// Ids of an email-only account.
    pub fn ftc(ftc_id: impl Into<String>) -> Self {
        Self {
            ftc_id: Some(ftc_id.into()),
            union_id: None,
        }
    }

    /// Canonical key: FTC id when present, otherwise union id.
    pub fn compound_id(&self) -> &str {
        self.ftc_id
            .as_deref()
            .or(self.union_id.as_deref())
            .unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.compound_id().is_empty()
    }
}

impl fmt::Display for UserIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.compound_id())
    }
}
