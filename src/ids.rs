//! Opaque string identifiers.
//!
//! Every id on the wire is a plain string; the newtypes only keep peers,
//! rooms, streams, and whiteboard elements from being mixed up in
//! signatures.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Participant identity, assigned by the transport and stable for the
    /// connection's lifetime.
    PeerId
);
string_id!(
    /// Room name shared by all participants.
    RoomId
);
string_id!(
    /// Media stream handle id.
    StreamId
);
string_id!(
    /// Whiteboard element id.
    ElementId
);
string_id!(DeskItemId);

const SCREEN_SUFFIX: &str = "-screen";

impl PeerId {
    /// Derived id of this peer's screen-share record.
    #[must_use]
    pub fn screen(&self) -> PeerId {
        PeerId(format!("{}{SCREEN_SUFFIX}", self.0))
    }

    /// Fresh random id, for transports that assign their own.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

const ROOM_ADJECTIVES: [&str; 6] = ["cozy", "chill", "dreamy", "soft", "quiet", "warm"];
const ROOM_NOUNS: [&str; 6] = ["nook", "cafe", "cloud", "corner", "study", "loft"];

impl RoomId {
    /// Shareable `adjective-noun-NNN` room name.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let adjective = ROOM_ADJECTIVES[rng.random_range(0..ROOM_ADJECTIVES.len())];
        let noun = ROOM_NOUNS[rng.random_range(0..ROOM_NOUNS.len())];
        Self(format!("{adjective}-{noun}-{}", rng.random_range(0..1000)))
    }
}

impl StreamId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl ElementId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl DeskItemId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_id_is_derived_from_owner() {
        let peer = PeerId::new("abc");
        assert_eq!(peer.screen().as_str(), "abc-screen");
    }

    #[test]
    fn ids_serialize_as_bare_strings() {
        let json = serde_json::to_string(&StreamId::new("s1")).expect("serialize");
        assert_eq!(json, "\"s1\"");
        let back: StreamId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, StreamId::new("s1"));
    }

    #[test]
    fn generated_ids_differ() {
        assert_ne!(ElementId::generate(), ElementId::generate());
        assert_ne!(PeerId::generate(), PeerId::generate());
    }

    #[test]
    fn room_names_are_adjective_noun_number() {
        let room = RoomId::generate();
        let parts: Vec<&str> = room.as_str().split('-').collect();
        assert_eq!(parts.len(), 3);
        assert!(ROOM_ADJECTIVES.contains(&parts[0]));
        assert!(ROOM_NOUNS.contains(&parts[1]));
        assert!(parts[2].parse::<u16>().is_ok_and(|n| n < 1000));
    }
}
