//! Key-sharded registry of live room actors.
//!
//! Each room is one spawned task owning its state, fed by an `mpsc` command
//! channel; everything that touches a key's state goes through that channel,
//! so operations for one key are serialized and keys run in parallel.

use crate::chat::{self, ChatError};
use crate::notify;
use crate::presence;
use crate::session::SessionId;
use crate::storage::{Storage, StorageError};
use crate::workspace;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use huntboard_protocol::{Attachment, RoomKey};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

const COMMAND_BUFFER: usize = 256;

/// Routes commands to the live actor for a key, spawning one if needed.
///
/// The map's entry lock makes first use exclusive: concurrent callers for a
/// fresh key agree on a single actor. An actor that has exited leaves a
/// closed sender behind; the next lookup replaces it.
struct RoomMap<C> {
    rooms: DashMap<RoomKey, mpsc::Sender<C>>,
}

impl<C: Send + 'static> RoomMap<C> {
    fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    fn get_or_spawn<F>(&self, key: &RoomKey, spawn: F) -> mpsc::Sender<C>
    where
        F: FnOnce(RoomKey, mpsc::Receiver<C>),
    {
        match self.rooms.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_closed() {
                    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
                    spawn(key.clone(), rx);
                    occupied.insert(tx.clone());
                    tx
                } else {
                    occupied.get().clone()
                }
            }
            Entry::Vacant(vacant) => {
                let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
                spawn(key.clone(), rx);
                vacant.insert(tx.clone());
                tx
            }
        }
    }
}

/// Live actor registries for all four room kinds, plus the shared
/// dependencies they spawn with.
///
/// This is the surface the transport layer connects through and the
/// mutation layer calls `invalidate_workspace`/`publish` on after it has
/// committed a write.
pub struct Rooms {
    storage: Arc<dyn Storage>,
    chat_retention: Duration,
    workspace: RoomMap<workspace::Command>,
    presence: RoomMap<presence::Command>,
    chat: RoomMap<chat::Command>,
    notify: RoomMap<notify::Command>,
}

impl Rooms {
    pub fn new(storage: Arc<dyn Storage>, chat_retention: Duration) -> Self {
        Self {
            storage,
            chat_retention,
            workspace: RoomMap::new(),
            presence: RoomMap::new(),
            chat: RoomMap::new(),
            notify: RoomMap::new(),
        }
    }

    fn workspace_room(&self, key: &RoomKey) -> mpsc::Sender<workspace::Command> {
        self.workspace.get_or_spawn(key, |key, rx| {
            workspace::spawn(key, rx, Arc::clone(&self.storage));
        })
    }

    fn presence_room(&self, key: &RoomKey) -> mpsc::Sender<presence::Command> {
        self.presence.get_or_spawn(key, presence::spawn)
    }

    fn chat_room(&self, key: &RoomKey) -> mpsc::Sender<chat::Command> {
        self.chat.get_or_spawn(key, |key, rx| {
            chat::spawn(key, rx, Arc::clone(&self.storage), self.chat_retention);
        })
    }

    fn notify_room(&self, key: &RoomKey) -> mpsc::Sender<notify::Command> {
        self.notify.get_or_spawn(key, notify::spawn)
    }

    // ------------------------------------------------------------------
    // Workspace rooms
    // ------------------------------------------------------------------

    /// Idempotent first load of a workspace aggregate.
    pub async fn ensure_workspace(&self, key: &RoomKey) -> Result<(), StorageError> {
        let room = self.workspace_room(key);
        let (reply, rx) = oneshot::channel();
        if room.send(workspace::Command::Ensure { reply }).await.is_err() {
            return Err(StorageError::Unavailable("workspace room closed".to_owned()));
        }
        rx.await
            .unwrap_or_else(|_| Err(StorageError::Unavailable("workspace room closed".to_owned())))
    }

    pub async fn connect_workspace(
        &self,
        key: &RoomKey,
        attachment: Attachment,
        sender: mpsc::Sender<String>,
    ) -> Result<SessionId, StorageError> {
        for _ in 0..2 {
            let room = self.workspace_room(key);
            let (reply, rx) = oneshot::channel();
            let cmd = workspace::Command::Connect {
                attachment: attachment.clone(),
                sender: sender.clone(),
                reply,
            };
            if room.send(cmd).await.is_ok() {
                if let Ok(result) = rx.await {
                    return result;
                }
            }
        }
        Err(StorageError::Unavailable("workspace room closed".to_owned()))
    }

    pub async fn disconnect_workspace(&self, key: &RoomKey, id: SessionId) {
        let _ = self
            .workspace_room(key)
            .send(workspace::Command::Disconnect { id })
            .await;
    }

    /// Re-read the workspace aggregate and push the fresh snapshot to every
    /// attached session.
    pub async fn invalidate_workspace(&self, key: &RoomKey) -> Result<(), StorageError> {
        let room = self.workspace_room(key);
        let (reply, rx) = oneshot::channel();
        if room
            .send(workspace::Command::Invalidate { reply })
            .await
            .is_err()
        {
            return Err(StorageError::Unavailable("workspace room closed".to_owned()));
        }
        rx.await
            .unwrap_or_else(|_| Err(StorageError::Unavailable("workspace room closed".to_owned())))
    }

    // ------------------------------------------------------------------
    // Presence rooms
    // ------------------------------------------------------------------

    pub async fn join_presence(
        &self,
        key: &RoomKey,
        attachment: Attachment,
        sender: mpsc::Sender<String>,
    ) -> Option<SessionId> {
        for _ in 0..2 {
            let room = self.presence_room(key);
            let (reply, rx) = oneshot::channel();
            let cmd = presence::Command::Join {
                attachment: attachment.clone(),
                sender: sender.clone(),
                reply,
            };
            if room.send(cmd).await.is_ok() {
                if let Ok(id) = rx.await {
                    return Some(id);
                }
            }
        }
        None
    }

    pub async fn leave_presence(&self, key: &RoomKey, id: SessionId) {
        let _ = self
            .presence_room(key)
            .send(presence::Command::Leave { id })
            .await;
    }

    // ------------------------------------------------------------------
    // Chat rooms
    // ------------------------------------------------------------------

    pub async fn connect_chat(
        &self,
        key: &RoomKey,
        attachment: Attachment,
        sender: mpsc::Sender<String>,
    ) -> Result<SessionId, ChatError> {
        for _ in 0..2 {
            let room = self.chat_room(key);
            let (reply, rx) = oneshot::channel();
            let cmd = chat::Command::Connect {
                attachment: attachment.clone(),
                sender: sender.clone(),
                reply,
            };
            if room.send(cmd).await.is_ok() {
                if let Ok(result) = rx.await {
                    return result;
                }
            }
        }
        Err(ChatError::Unavailable)
    }

    pub async fn disconnect_chat(&self, key: &RoomKey, id: SessionId) {
        let _ = self
            .chat_room(key)
            .send(chat::Command::Disconnect { id })
            .await;
    }

    /// Persist and broadcast one message on behalf of a live session.
    pub async fn post_chat(
        &self,
        key: &RoomKey,
        id: SessionId,
        text: String,
    ) -> Result<(), ChatError> {
        let room = self.chat_room(key);
        let (reply, rx) = oneshot::channel();
        if room
            .send(chat::Command::Post { id, text, reply })
            .await
            .is_err()
        {
            return Err(ChatError::Unavailable);
        }
        rx.await.unwrap_or(Err(ChatError::Unavailable))
    }

    // ------------------------------------------------------------------
    // Notification rooms
    // ------------------------------------------------------------------

    pub async fn subscribe_notify(
        &self,
        key: &RoomKey,
        attachment: Attachment,
        sender: mpsc::Sender<String>,
    ) -> Option<SessionId> {
        for _ in 0..2 {
            let room = self.notify_room(key);
            let (reply, rx) = oneshot::channel();
            let cmd = notify::Command::Subscribe {
                attachment: attachment.clone(),
                sender: sender.clone(),
                reply,
            };
            if room.send(cmd).await.is_ok() {
                if let Ok(id) = rx.await {
                    return Some(id);
                }
            }
        }
        None
    }

    pub async fn unsubscribe_notify(&self, key: &RoomKey, id: SessionId) {
        let _ = self
            .notify_room(key)
            .send(notify::Command::Unsubscribe { id })
            .await;
    }

    /// Fan a server-pushed event out to every subscriber of a key.
    pub async fn publish(&self, key: &RoomKey, payload: serde_json::Value) {
        let _ = self
            .notify_room(key)
            .send(notify::Command::Publish { payload })
            .await;
    }
}
