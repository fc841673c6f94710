//! Type-safe identifier wrappers.
//!
//! Actors are identified by a stable UUID. Realms (dimensions) are named by
//! the host, and announcements carry the monotonically increasing row id
//! assigned by the key store.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
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
    /// Stable identity of a player (actor), persisted as its hyphenated string.
    ActorId
}

/// Name of a realm (world dimension), e.g. `overworld`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RealmId(pub String);

impl RealmId {
    /// Create a realm identifier from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the realm name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RealmId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Row id of an announcement. Zero means "nothing seen yet".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AnnouncementId(pub i64);

impl AnnouncementId {
    /// The id every actor starts from before any announcement was seen.
    pub const NONE: Self = Self(0);

    /// Return the raw row id.
    pub const fn into_inner(self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for AnnouncementId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_id_parses_from_display() {
        let id = ActorId::new();
        let parsed: Result<ActorId, _> = id.to_string().parse();
        assert_eq!(parsed.ok(), Some(id));
    }

    #[test]
    fn actor_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<ActorId>().is_err());
    }

    #[test]
    fn realm_serializes_as_plain_string() {
        let json = serde_json::to_string(&RealmId::new("overworld")).ok();
        assert_eq!(json.as_deref(), Some("\"overworld\""));
    }

    #[test]
    fn announcement_ids_order_numerically() {
        assert!(AnnouncementId(3) > AnnouncementId(2));
        assert_eq!(AnnouncementId::default(), AnnouncementId::NONE);
    }
}
