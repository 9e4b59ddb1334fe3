//! Client-minted identifiers.
//!
//! Provisional user-message ids, provisional turn ids and side-channel
//! envelope ids are separate newtypes so one cannot stand in for another.
//! Fresh ids are time-ordered UUID v7 strings; ids received from the server
//! are wrapped as-is.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! client_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Mint a fresh id.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            /// Borrow the id text.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Take the id text.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

client_id! {
    /// An assistant turn. Provisional until `meta.start` names the real one.
    TurnId
}

client_id! {
    /// A user message shown before the request goes out.
    MessageId
}

client_id! {
    /// A side-channel envelope (`WsMessage::id`).
    FrameId
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
