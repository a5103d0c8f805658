//! Branded ID newtypes for type safety.
//!
//! Every entity in the Sage data model has a distinct ID type implemented as a
//! newtype wrapper around `String`. This prevents accidentally passing a chat
//! ID where a message ID is expected.
//!
//! Generated IDs carry a short entity prefix (`chat_`, `msg_`, ...) followed by
//! a UUID v7, so they sort by creation time and are recognizable in logs.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID (prefixed UUID v7, time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(format!(concat!($prefix, "_{}"), Uuid::now_v7()))
            }

            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Unique identifier for a chat.
    ChatId, "chat"
}

branded_id! {
    /// Unique identifier for a user (chat owner).
    UserId, "usr"
}

branded_id! {
    /// Unique identifier for a message within a chat.
    MessageId, "msg"
}

branded_id! {
    /// Unique identifier for a branch within a chat.
    BranchId, "br"
}

branded_id! {
    /// Unique identifier for a streaming session (one assistant turn).
    StreamingSessionId, "ss"
}

branded_id! {
    /// Unique identifier for a resumable generation stream.
    ResumableStreamId, "rs"
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
