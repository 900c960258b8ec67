//! Chat rooms: persisted, replayed, expiring message logs.

use crate::session::{encode, SessionId, SessionSet};
use crate::storage::{Storage, StorageError};
use chrono::Utc;
use huntboard_protocol::{Attachment, ChatMessage, RoomKey, ServerEvent};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("unknown session")]
    UnknownSession,

    #[error("chat room unavailable")]
    Unavailable,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub enum Command {
    Connect {
        attachment: Attachment,
        sender: mpsc::Sender<String>,
        reply: oneshot::Sender<Result<SessionId, ChatError>>,
    },
    Disconnect {
        id: SessionId,
    },
    Post {
        id: SessionId,
        text: String,
        reply: oneshot::Sender<Result<(), ChatError>>,
    },
}

pub fn spawn(key: RoomKey, rx: mpsc::Receiver<Command>, storage: Arc<dyn Storage>, retention: Duration) {
    tokio::spawn(run(key, rx, storage, retention));
}

async fn run(
    key: RoomKey,
    mut rx: mpsc::Receiver<Command>,
    storage: Arc<dyn Storage>,
    retention: Duration,
) {
    tracing::debug!(%key, "chat room started");
    let mut sessions = SessionSet::default();
    // (millis, nonce) of the last assigned message key; keys never regress.
    let mut last_key = (0i64, 0u32);
    let mut deadline = Instant::now() + retention;

    loop {
        tokio::select! {
            cmd = rx.recv() => {
                let Some(cmd) = cmd else { break };
                match cmd {
                    Command::Connect { attachment, sender, reply } => {
                        // Replay the full ordered log before the session can
                        // observe any live message.
                        match storage.list_chat(key.as_str()).await {
                            Ok(messages) => {
                                let id = sessions.attach(attachment, sender);
                                if let Some(frame) = encode(&ServerEvent::ChatHistory { messages }) {
                                    if let Some(session) = sessions.get(id) {
                                        session.send(&frame).await;
                                    }
                                }
                                let _ = reply.send(Ok(id));
                                deadline = Instant::now() + retention;
                            }
                            Err(err) => {
                                tracing::warn!(%key, %err, "chat replay failed");
                                let _ = reply.send(Err(err.into()));
                            }
                        }
                    }
                    Command::Disconnect { id } => {
                        sessions.detach(id);
                    }
                    Command::Post { id, text, reply } => {
                        let result = post(&key, &sessions, &*storage, &mut last_key, id, text).await;
                        match result {
                            Ok(message) => {
                                if let Some(frame) = encode(&ServerEvent::Chat { message }) {
                                    sessions.broadcast(&frame).await;
                                }
                                deadline = Instant::now() + retention;
                                let _ = reply.send(Ok(()));
                            }
                            Err(err) => {
                                // Nothing was persisted, so nothing is broadcast.
                                let _ = reply.send(Err(err));
                            }
                        }
                    }
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                // The wake-up fired with no intervening connect/post.
                match storage.purge_chat(key.as_str()).await {
                    Ok(()) => {
                        tracing::info!(%key, "chat log expired and purged");
                        if sessions.is_empty() {
                            break;
                        }
                    }
                    Err(err) => tracing::warn!(%key, %err, "chat purge failed, will retry"),
                }
                deadline = Instant::now() + retention;
            }
        }
    }
    tracing::debug!(%key, "chat room stopped");
}

/// Persist one message. The author comes from the posting session's
/// attachment, never from the client payload.
async fn post(
    key: &RoomKey,
    sessions: &SessionSet,
    storage: &dyn Storage,
    last_key: &mut (i64, u32),
    id: SessionId,
    text: String,
) -> Result<ChatMessage, ChatError> {
    let author = sessions
        .get(id)
        .map(|session| session.attachment.display_name.clone())
        .ok_or(ChatError::UnknownSession)?;
    let timestamp = Utc::now();
    let message = ChatMessage {
        key: next_message_key(last_key, timestamp.timestamp_millis()),
        author,
        text,
        timestamp,
    };
    storage.append_chat(key.as_str(), &message).await?;
    Ok(message)
}

/// Assign a lexicographically sortable message key. The nonce breaks clock
/// ties; a clock that stands still or steps backwards reuses the last
/// observed millisecond so keys stay strictly increasing.
fn next_message_key(last: &mut (i64, u32), now_millis: i64) -> String {
    if now_millis > last.0 {
        *last = (now_millis, 0);
    } else {
        last.1 += 1;
    }
    format!("{:016x}-{:08x}", last.0, last.1)
}

#[cfg(test)]
mod tests {
    use super::next_message_key;

    #[test]
    fn message_keys_sort_in_send_order() {
        let mut last = (0, 0);
        let a = next_message_key(&mut last, 1_000);
        let b = next_message_key(&mut last, 1_000);
        let c = next_message_key(&mut last, 2_000);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn message_keys_survive_a_backwards_clock() {
        let mut last = (0, 0);
        let a = next_message_key(&mut last, 2_000);
        let b = next_message_key(&mut last, 1_500);
        assert!(a < b);
    }
}
