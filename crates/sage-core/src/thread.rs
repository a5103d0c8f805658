//! Thread references and message roles.
//!
//! [`ThreadRef`] is the tagged union a caller uses to select which linear view
//! of a chat they want: the main thread, or a specific branch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ids::BranchId;

/// Which linear message sequence of a chat to read or write.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "branchId", rename_all = "snake_case")]
pub enum ThreadRef {
    /// The main thread — messages with no branch association.
    Main,
    /// A specific branch forked off the main thread.
    Branch(BranchId),
}

impl ThreadRef {
    /// The branch ID, if this reference names a branch.
    #[must_use]
    pub fn branch_id(&self) -> Option<&BranchId> {
        match self {
            Self::Main => None,
            Self::Branch(id) => Some(id),
        }
    }

    /// Build a reference from an optional branch ID.
    ///
    /// `None` means the main thread.
    #[must_use]
    pub fn from_option(branch_id: Option<BranchId>) -> Self {
        branch_id.map_or(Self::Main, Self::Branch)
    }
}

impl fmt::Display for ThreadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => f.write_str("main"),
            Self::Branch(id) => write!(f, "branch:{id}"),
        }
    }
}

/// Author role of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Written by the student.
    User,
    /// Generated by the assistant.
    Assistant,
    /// System prompt or instruction.
    System,
}

impl MessageRole {
    /// Stable string form used in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            other => Err(UnknownRole(other.to_owned())),
        }
    }
}

/// Error returned when parsing an unrecognized role string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown message role: {}", self.0)
    }
}

impl std::error::Error for UnknownRole {}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn thread_ref_from_option() {
        assert_eq!(ThreadRef::from_option(None), ThreadRef::Main);
        assert_eq!(
            ThreadRef::from_option(Some(BranchId::from("br_1"))),
            ThreadRef::Branch(BranchId::from("br_1"))
        );
    }

    #[test]
    fn thread_ref_branch_id() {
        assert!(ThreadRef::Main.branch_id().is_none());
        let r = ThreadRef::Branch(BranchId::from("br_1"));
        assert_eq!(r.branch_id().map(BranchId::as_str), Some("br_1"));
    }

    #[test]
    fn thread_ref_display() {
        assert_eq!(ThreadRef::Main.to_string(), "main");
        assert_eq!(
            ThreadRef::Branch(BranchId::from("br_1")).to_string(),
            "branch:br_1"
        );
    }

    #[test]
    fn thread_ref_serde_roundtrip() {
        let r = ThreadRef::Branch(BranchId::from("br_1"));
        let json = serde_json::to_string(&r).unwrap();
        let back: ThreadRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [MessageRole::User, MessageRole::Assistant, MessageRole::System] {
            assert_eq!(role.as_str().parse::<MessageRole>().unwrap(), role);
        }
    }

    #[test]
    fn role_rejects_unknown() {
        assert_matches!("moderator".parse::<MessageRole>(), Err(UnknownRole(s)) if s == "moderator");
    }

    #[test]
    fn role_serde_is_lowercase() {
        let json = serde_json::to_string(&MessageRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
