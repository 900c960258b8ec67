//! Notification rooms: stateless staleness fan-out.
//!
//! A publish is relayed verbatim to whoever is subscribed right now and then
//! forgotten. Clients treat notifications as hints and re-fetch
//! authoritative state on reconnect.

use crate::session::{encode, SessionId, SessionSet};
use chrono::Utc;
use huntboard_protocol::{Attachment, RoomKey, ServerEvent};
use tokio::sync::{mpsc, oneshot};

pub enum Command {
    Subscribe {
        attachment: Attachment,
        sender: mpsc::Sender<String>,
        reply: oneshot::Sender<SessionId>,
    },
    Unsubscribe {
        id: SessionId,
    },
    /// Server-side fan-out; needs no live session.
    Publish {
        payload: serde_json::Value,
    },
}

pub fn spawn(key: RoomKey, rx: mpsc::Receiver<Command>) {
    tokio::spawn(run(key, rx));
}

async fn run(key: RoomKey, mut rx: mpsc::Receiver<Command>) {
    tracing::debug!(%key, "notification room started");
    let mut sessions = SessionSet::default();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Subscribe {
                attachment,
                sender,
                reply,
            } => {
                let id = sessions.attach(attachment, sender);
                let _ = reply.send(id);
            }
            Command::Unsubscribe { id } => {
                sessions.detach(id);
                if sessions.is_empty() {
                    break;
                }
            }
            Command::Publish { payload } => {
                if let Some(frame) = encode(&ServerEvent::Notification {
                    payload,
                    timestamp: Utc::now(),
                }) {
                    sessions.broadcast(&frame).await;
                }
            }
        }
    }
    tracing::debug!(%key, "notification room stopped");
}
