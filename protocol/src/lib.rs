//! Shared types for the huntboard real-time layer.
//!
//! Everything that crosses a crate or wire boundary lives here: room keys,
//! verified identities, session attachments, workspace aggregates, chat
//! messages, and the JSON frames exchanged with connected clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable identifier for one room actor instance.
///
/// A key is a workspace id, a puzzle id, or a chat-thread id. The registry
/// guarantees at most one live actor per key at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomKey(pub String);

impl RoomKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomKey {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

/// Verified identity produced by the identity provider at connection accept.
///
/// Rooms trust this value once, at accept time, and carry it in the session
/// attachment; later operations never re-derive identity from client data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub display_name: String,
    pub subject_id: String,
}

/// Claims embedded in the connection ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketClaims {
    /// Expiration timestamp (Unix seconds).
    pub exp: u64,
    pub identity: Identity,
}

/// Payload carried by one live session.
///
/// Travels with the connection itself, so a reconnect rebuilds it without
/// any server-side session store. Set once at accept time, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub display_name: String,
    /// Which sub-entity (puzzle) the session is viewing, if any.
    pub sub_key: Option<String>,
}

impl Attachment {
    pub fn new(identity: &Identity, sub_key: Option<String>) -> Self {
        Self {
            display_name: identity.display_name.clone(),
            sub_key,
        }
    }
}

/// Sub-key to sorted, de-duplicated viewer names.
pub type PresenceMap = BTreeMap<String, Vec<String>>;

/// One immutable entry in a chat log.
///
/// `key` sorts lexicographically in send order; the room assigns it from a
/// server timestamp plus a tie-breaking nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub key: String,
    pub author: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Puzzle lifecycle status.
///
/// `Solved` is terminal: solved puzzles drop out of the desired channel
/// topology on the next reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PuzzleStatus {
    Open,
    Solved,
}

impl PuzzleStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PuzzleStatus::Solved)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Puzzle {
    pub id: String,
    pub name: String,
    pub status: PuzzleStatus,
    pub answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub id: String,
    pub name: String,
    pub puzzles: Vec<Puzzle>,
}

/// One line of the workspace activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: String,
}

/// Denormalized read-model of one workspace aggregate.
///
/// Cached whole inside the workspace room and always replaced whole, never
/// patched field-by-field, so readers cannot observe a torn state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSnapshot {
    pub id: String,
    pub name: String,
    pub rounds: Vec<Round>,
    pub activity: Vec<ActivityEntry>,
}

/// Frames pushed to clients, JSON-tagged by type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full recomputed presence map, sent after every join/leave.
    Presence { viewers: PresenceMap },
    /// Full ordered log replay, sent once after a chat connect.
    ChatHistory { messages: Vec<ChatMessage> },
    /// One newly appended chat message.
    Chat { message: ChatMessage },
    /// Full fresh workspace snapshot, sent on connect and on invalidation.
    Workspace { snapshot: WorkspaceSnapshot },
    /// Server-pushed staleness hint, relayed verbatim. Not retained: a late
    /// subscriber misses it and re-fetches authoritative state instead.
    Notification {
        payload: serde_json::Value,
        timestamp: DateTime<Utc>,
    },
    Error { message: String },
}

/// Frames sent by clients. Only chat rooms accept input today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Post { text: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_event_tags_are_stable() {
        let event = ServerEvent::Notification {
            payload: serde_json::json!({"kind": "workspace_stale"}),
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "notification");
        assert_eq!(value["payload"]["kind"], "workspace_stale");
    }

    #[test]
    fn client_post_frame_round_trips() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"post","text":"hello"}"#).unwrap();
        assert_eq!(
            frame,
            ClientFrame::Post {
                text: "hello".to_owned()
            }
        );
    }

    #[test]
    fn solved_is_the_only_terminal_status() {
        assert!(PuzzleStatus::Solved.is_terminal());
        assert!(!PuzzleStatus::Open.is_terminal());
    }
}
