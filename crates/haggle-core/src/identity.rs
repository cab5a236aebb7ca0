//! # Identity Newtypes
//!
//! Identifiers for the negotiation domain. Each identifier is a distinct
//! type; you cannot pass a [`CourierId`] where a [`BidId`] is expected.
//! All are UUID-backed and therefore valid by construction.
//!
//! Serialized transparently as the bare UUID string so the wire format
//! stays `"3f0c…"` rather than `{"0": "3f0c…"}`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an identifier from an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(
    /// A delivery request under negotiation.
    DeliveryId
);

uuid_id!(
    /// A courier's bid against a delivery.
    BidId
);

uuid_id!(
    /// A courier. Referenced by id only; the engine owns no courier data.
    CourierId
);

uuid_id!(
    /// A courier's viewing/interest signal on a delivery.
    ConsultationId
);
