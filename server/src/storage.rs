//! Storage interface consumed by the room actors.
//!
//! The relational tier lives elsewhere; rooms only ever ask it for a full
//! aggregate or touch a chat log through this trait.

use async_trait::async_trait;
use huntboard_protocol::{ChatMessage, WorkspaceSnapshot};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("workspace not found: {0}")]
    NotFound(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Aggregate reads and chat-log persistence, implemented by the data tier.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Load the full denormalized aggregate for a workspace.
    async fn load_workspace(&self, key: &str) -> Result<WorkspaceSnapshot, StorageError>;

    /// Append one message to a chat log.
    async fn append_chat(&self, key: &str, message: &ChatMessage) -> Result<(), StorageError>;

    /// List a chat log in message-key order.
    async fn list_chat(&self, key: &str) -> Result<Vec<ChatMessage>, StorageError>;

    /// Drop a chat log wholesale.
    async fn purge_chat(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory storage for tests and development.
#[derive(Default)]
pub struct MemoryStorage {
    workspaces: Mutex<HashMap<String, WorkspaceSnapshot>>,
    chats: Mutex<HashMap<String, BTreeMap<String, ChatMessage>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_workspace(&self, snapshot: WorkspaceSnapshot) {
        self.workspaces
            .lock()
            .await
            .insert(snapshot.id.clone(), snapshot);
    }

    pub async fn chat_len(&self, key: &str) -> usize {
        self.chats
            .lock()
            .await
            .get(key)
            .map(|log| log.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn load_workspace(&self, key: &str) -> Result<WorkspaceSnapshot, StorageError> {
        self.workspaces
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_owned()))
    }

    async fn append_chat(&self, key: &str, message: &ChatMessage) -> Result<(), StorageError> {
        self.chats
            .lock()
            .await
            .entry(key.to_owned())
            .or_default()
            .insert(message.key.clone(), message.clone());
        Ok(())
    }

    async fn list_chat(&self, key: &str) -> Result<Vec<ChatMessage>, StorageError> {
        Ok(self
            .chats
            .lock()
            .await
            .get(key)
            .map(|log| log.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn purge_chat(&self, key: &str) -> Result<(), StorageError> {
        self.chats.lock().await.remove(key);
        Ok(())
    }
}
