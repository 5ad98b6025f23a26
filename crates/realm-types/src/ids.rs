//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Every backend row the client touches has a strongly-typed ID so that a
//! listing id can never be passed where a quest id is expected. The backend
//! generates ids on insert; the `new()` constructors exist for the in-memory
//! backend, tests, and seed data.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl core::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Identifier of an authenticated user (issued by the auth service).
    UserId
}

define_id! {
    /// Identifier of a collectible definition in the catalogue.
    CollectibleId
}

define_id! {
    /// Identifier of one acquisition of a collectible by a user.
    ///
    /// A user holding two copies of the same collectible has two
    /// acquisitions with the same [`CollectibleId`].
    AcquisitionId
}

define_id! {
    /// Identifier of a user's wallet row.
    WalletId
}

define_id! {
    /// Identifier of an economy ledger entry.
    LedgerEntryId
}

define_id! {
    /// Identifier of an assigned daily quest (the user's quest row).
    QuestId
}

define_id! {
    /// Identifier of a quest definition.
    QuestDefinitionId
}

define_id! {
    /// Identifier of an achievement, earned or defined.
    AchievementId
}

define_id! {
    /// Identifier of a seasonal event.
    SeasonalEventId
}

define_id! {
    /// Identifier of a marketplace listing.
    ListingId
}

define_id! {
    /// Identifier of a curated showcase entry.
    ShowcaseId
}

define_id! {
    /// Identifier of a redemption code.
    CodeId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_values() {
        let a = ListingId::new();
        let b = ListingId::new();
        assert_ne!(a, b);
        assert_ne!(a.into_inner(), Uuid::nil());
    }

    #[test]
    fn id_serializes_as_bare_uuid() {
        let id = QuestId::new();
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, format!("\"{}\"", id.into_inner()));
    }

    #[test]
    fn id_parses_from_display() {
        let id = CodeId::new();
        let parsed: Result<CodeId, _> = id.to_string().parse();
        assert_eq!(parsed.ok(), Some(id));
    }
}
