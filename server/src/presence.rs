//! Presence rooms: who is viewing which puzzle within a workspace.

use crate::session::{encode, SessionId, SessionSet};
use huntboard_protocol::{Attachment, RoomKey, ServerEvent};
use tokio::sync::{mpsc, oneshot};

pub enum Command {
    Join {
        attachment: Attachment,
        sender: mpsc::Sender<String>,
        reply: oneshot::Sender<SessionId>,
    },
    Leave {
        id: SessionId,
    },
}

pub fn spawn(key: RoomKey, rx: mpsc::Receiver<Command>) {
    tokio::spawn(run(key, rx));
}

async fn run(key: RoomKey, mut rx: mpsc::Receiver<Command>) {
    tracing::debug!(%key, "presence room started");
    let mut sessions = SessionSet::default();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Join {
                attachment,
                sender,
                reply,
            } => {
                let id = sessions.attach(attachment, sender);
                let _ = reply.send(id);
                rebroadcast(&sessions).await;
            }
            Command::Leave { id } => {
                if sessions.detach(id).is_some() {
                    if sessions.is_empty() {
                        break;
                    }
                    rebroadcast(&sessions).await;
                }
            }
        }
    }
    tracing::debug!(%key, "presence room stopped");
}

/// Recompute the full map from the live attachments and push it to every
/// session, the new one included.
async fn rebroadcast(sessions: &SessionSet) {
    if let Some(frame) = encode(&ServerEvent::Presence {
        viewers: sessions.presence(),
    }) {
        sessions.broadcast(&frame).await;
    }
}
