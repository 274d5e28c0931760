//! Type-safe identifiers.
//!
//! Every entity gets a newtype wrapper around [`uuid::Uuid`] (v4) so that an
//! event ID can never be passed where a candidate ID is expected.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
        )]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Creates a new random identifier (UUID v4).
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Wraps an existing [`uuid::Uuid`].
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner [`uuid::Uuid`].
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
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

        impl From<uuid::Uuid> for $name {
            fn from(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// Unique identifier of an event (gala, party, ceremony).
    EventId
);
define_id!(
    /// Unique identifier of an award category.
    CategoryId
);
define_id!(
    /// Unique identifier of a candidate (nominee).
    CandidateId
);
define_id!(
    /// Unique identifier of a per-event voter (guest).
    VoterId
);
define_id!(
    /// Unique identifier of a platform user account.
    UserId
);
define_id!(
    /// Unique identifier of a subscription.
    SubscriptionId
);
define_id!(
    /// Unique identifier of an invoice.
    InvoiceId
);
define_id!(
    /// Unique identifier of an admin notification.
    NotificationId
);

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_unique_ids() {
        assert_ne!(EventId::new(), EventId::new());
    }

    #[test]
    fn display_is_uuid_format() {
        let s = CategoryId::new().to_string();
        assert_eq!(s.len(), 36);
        assert!(s.contains('-'));
    }

    #[test]
    fn serializes_as_plain_string() {
        let uuid = uuid::Uuid::new_v4();
        let id = VoterId::from_uuid(uuid);
        let Ok(json) = serde_json::to_string(&id) else {
            panic!("serialization failed");
        };
        assert_eq!(json, format!("\"{uuid}\""));
    }

    #[test]
    fn usable_as_json_map_key() {
        use std::collections::BTreeMap;
        let mut map = BTreeMap::new();
        let id = CandidateId::new();
        map.insert(id, 3_u64);
        let Ok(json) = serde_json::to_string(&map) else {
            panic!("serialization failed");
        };
        let Ok(back) = serde_json::from_str::<BTreeMap<CandidateId, u64>>(&json) else {
            panic!("deserialization failed");
        };
        assert_eq!(back.get(&id), Some(&3));
    }
}
