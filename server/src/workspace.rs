//! Workspace rooms: cached aggregate snapshots with invalidation fan-out.

use crate::session::{encode, SessionId, SessionSet};
use crate::storage::{Storage, StorageError};
use huntboard_protocol::{Attachment, RoomKey, ServerEvent, WorkspaceSnapshot};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

pub enum Command {
    /// Load the aggregate if this room has never loaded it. Idempotent; the
    /// actor's serialized mailbox is the mutual exclusion, so concurrent
    /// first-callers cannot populate the cache twice.
    Ensure {
        reply: oneshot::Sender<Result<(), StorageError>>,
    },
    Connect {
        attachment: Attachment,
        sender: mpsc::Sender<String>,
        reply: oneshot::Sender<Result<SessionId, StorageError>>,
    },
    Disconnect {
        id: SessionId,
    },
    /// Re-read the aggregate and push the whole fresh snapshot to every
    /// session. Called by the mutation layer after its write is durable.
    Invalidate {
        reply: oneshot::Sender<Result<(), StorageError>>,
    },
}

pub fn spawn(key: RoomKey, rx: mpsc::Receiver<Command>, storage: Arc<dyn Storage>) {
    tokio::spawn(run(key, rx, storage));
}

async fn run(key: RoomKey, mut rx: mpsc::Receiver<Command>, storage: Arc<dyn Storage>) {
    tracing::debug!(%key, "workspace room started");
    let mut sessions = SessionSet::default();
    // Loaded on first use, then only ever replaced whole.
    let mut snapshot: Option<WorkspaceSnapshot> = None;

    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Ensure { reply } => {
                let result = match &snapshot {
                    Some(_) => Ok(()),
                    None => match storage.load_workspace(key.as_str()).await {
                        Ok(fresh) => {
                            snapshot = Some(fresh);
                            Ok(())
                        }
                        Err(err) => Err(err),
                    },
                };
                let _ = reply.send(result);
            }
            Command::Connect {
                attachment,
                sender,
                reply,
            } => {
                let current = match &snapshot {
                    Some(current) => Ok(current.clone()),
                    None => storage.load_workspace(key.as_str()).await,
                };
                match current {
                    Ok(current) => {
                        snapshot = Some(current.clone());
                        let id = sessions.attach(attachment, sender);
                        if let Some(frame) = encode(&ServerEvent::Workspace { snapshot: current }) {
                            if let Some(session) = sessions.get(id) {
                                session.send(&frame).await;
                            }
                        }
                        let _ = reply.send(Ok(id));
                    }
                    Err(err) => {
                        let _ = reply.send(Err(err));
                    }
                }
            }
            Command::Disconnect { id } => {
                sessions.detach(id);
            }
            Command::Invalidate { reply } => {
                match storage.load_workspace(key.as_str()).await {
                    Ok(fresh) => {
                        snapshot = Some(fresh.clone());
                        if let Some(frame) = encode(&ServerEvent::Workspace { snapshot: fresh }) {
                            sessions.broadcast(&frame).await;
                        }
                        let _ = reply.send(Ok(()));
                    }
                    Err(err) => {
                        // The previous snapshot stays; nothing is broadcast.
                        tracing::warn!(%key, %err, "workspace reload failed");
                        let _ = reply.send(Err(err));
                    }
                }
            }
        }
    }
    tracing::debug!(%key, "workspace room stopped");
}
