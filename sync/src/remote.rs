//! Remote topology API surface.

use crate::error::SyncError;
use async_trait::async_trait;

/// What kind of remote entity a listing row is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Category,
    Voice,
}

/// One entity in the remote scope's channel listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntity {
    pub id: String,
    pub name: String,
    pub kind: EntityKind,
    pub parent_id: Option<String>,
}

/// Field updates for an existing entity. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityUpdate {
    pub name: Option<String>,
    pub parent_id: Option<String>,
}

/// The chat platform's channel-topology API.
///
/// Creates are not assumed idempotent; the reconciler's dedup pass covers
/// retries and out-of-band edits. The remote scope is shared with human
/// operators, so listings are always taken fresh.
#[async_trait]
pub trait TopologyApi: Send + Sync {
    async fn list_entities(&self, scope: &str) -> Result<Vec<RemoteEntity>, SyncError>;

    async fn create_entity(
        &self,
        scope: &str,
        kind: EntityKind,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<RemoteEntity, SyncError>;

    async fn update_entity(&self, id: &str, update: EntityUpdate) -> Result<(), SyncError>;

    /// Deleting an entity that is already gone is success, not an error;
    /// the deferred-deletion worker may fire more than once.
    async fn delete_entity(&self, id: &str) -> Result<(), SyncError>;
}
