//! Session handles and the per-room session set.

use huntboard_protocol::{Attachment, PresenceMap, ServerEvent};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::mpsc;

/// Identifies one live session within its room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

/// One live client connection attached to a room.
///
/// Owned exclusively by the room actor while attached. The attachment is
/// set once at accept time from the verified connection context and never
/// mutated afterwards.
pub struct SessionHandle {
    pub id: SessionId,
    pub attachment: Attachment,
    sender: mpsc::Sender<String>,
}

impl SessionHandle {
    /// Best-effort send to this session's transport.
    pub async fn send(&self, frame: &str) {
        let _ = self.sender.send(frame.to_owned()).await;
    }
}

/// The set of sessions attached to one room actor.
#[derive(Default)]
pub struct SessionSet {
    next_id: u64,
    sessions: HashMap<SessionId, SessionHandle>,
}

impl SessionSet {
    pub fn attach(&mut self, attachment: Attachment, sender: mpsc::Sender<String>) -> SessionId {
        self.next_id += 1;
        let id = SessionId(self.next_id);
        self.sessions.insert(
            id,
            SessionHandle {
                id,
                attachment,
                sender,
            },
        );
        id
    }

    pub fn detach(&mut self, id: SessionId) -> Option<SessionHandle> {
        self.sessions.remove(&id)
    }

    pub fn get(&self, id: SessionId) -> Option<&SessionHandle> {
        self.sessions.get(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Send a frame to every attached session. Per-recipient failures are
    /// isolated; one dead connection never blocks delivery to the rest.
    pub async fn broadcast(&self, frame: &str) {
        for session in self.sessions.values() {
            session.send(frame).await;
        }
    }

    /// Recompute the presence map from the live attachments.
    ///
    /// Scans every session rather than tracking counters incrementally; the
    /// attachment set is the only source of truth, and a full rescan keeps
    /// duplicate suppression correct no matter how the set got here.
    pub fn presence(&self) -> PresenceMap {
        let mut buckets: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for session in self.sessions.values() {
            if let Some(sub_key) = &session.attachment.sub_key {
                buckets
                    .entry(sub_key.clone())
                    .or_default()
                    .insert(session.attachment.display_name.clone());
            }
        }
        buckets
            .into_iter()
            .map(|(sub_key, names)| (sub_key, names.into_iter().collect()))
            .collect()
    }
}

/// Encode an event as a wire frame.
pub fn encode(event: &ServerEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(frame) => Some(frame),
        Err(err) => {
            tracing::warn!(%err, "failed to encode server event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(name: &str, sub_key: Option<&str>) -> Attachment {
        Attachment {
            display_name: name.to_owned(),
            sub_key: sub_key.map(str::to_owned),
        }
    }

    #[tokio::test]
    async fn presence_deduplicates_and_sorts() {
        let mut sessions = SessionSet::default();
        let (tx, _rx) = mpsc::channel(8);
        sessions.attach(attachment("Zoe", Some("p1")), tx.clone());
        sessions.attach(attachment("Amy", Some("p1")), tx.clone());
        // Same identity, second tab.
        sessions.attach(attachment("Amy", Some("p1")), tx.clone());
        sessions.attach(attachment("Amy", None), tx);

        let presence = sessions.presence();
        assert_eq!(presence.len(), 1);
        assert_eq!(presence["p1"], vec!["Amy".to_owned(), "Zoe".to_owned()]);
        assert_eq!(sessions.len(), 4);
    }

    #[tokio::test]
    async fn broadcast_survives_a_dead_recipient() {
        let mut sessions = SessionSet::default();
        let (dead_tx, dead_rx) = mpsc::channel(8);
        drop(dead_rx);
        let (live_tx, mut live_rx) = mpsc::channel(8);
        sessions.attach(attachment("Amy", None), dead_tx);
        sessions.attach(attachment("Ben", None), live_tx);

        sessions.broadcast("hello").await;
        assert_eq!(live_rx.recv().await.unwrap(), "hello");
    }
}
