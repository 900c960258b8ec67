//! External topology reconciliation for huntboard workspaces.
//!
//! Mirrors a workspace's rounds and open puzzles onto a chat platform's
//! category/voice-channel topology: one category per round, one voice
//! channel per unsolved puzzle. Runs are serialized per remote scope,
//! writes are idempotent, and destructive operations are deferred behind a
//! fixed delay.

pub mod deletion;
pub mod discord;
pub mod error;
pub mod reconciler;
pub mod remote;
pub mod serializer;
pub mod topology;

pub use deletion::{DeletionQueue, PendingDeletion, TokioDeletionQueue, DEFAULT_DELETION_DELAY};
pub use discord::DiscordApi;
pub use error::SyncError;
pub use reconciler::{reconcile, SyncReport, OBSOLETE_PREFIX};
pub use remote::{EntityKind, EntityUpdate, RemoteEntity, TopologyApi};
pub use serializer::SyncSerializer;
pub use topology::DesiredTopology;

use std::future::Future;
use std::sync::Arc;

/// The single entry point the mutation layer enqueues after a committed
/// write: derive desired state, then reconcile, serialized per scope.
pub struct SyncEngine {
    api: Arc<dyn TopologyApi>,
    deletions: Arc<dyn DeletionQueue>,
    serializer: SyncSerializer,
}

impl SyncEngine {
    pub fn new(api: Arc<dyn TopologyApi>, deletions: Arc<dyn DeletionQueue>) -> Self {
        Self {
            api,
            deletions,
            serializer: SyncSerializer::new(),
        }
    }

    /// Reconcile one remote scope.
    ///
    /// `desired` is called only after this run holds the scope's lock, so a
    /// caller that queued behind another run reconciles against the state
    /// current at its own start, not a snapshot from trigger time.
    pub async fn sync_workspace<F, Fut>(
        &self,
        scope: &str,
        desired: F,
    ) -> Result<SyncReport, SyncError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<DesiredTopology, SyncError>>,
    {
        self.serializer
            .run_exclusive(scope, move || async move {
                let desired = desired().await?;
                reconcile(&*self.api, &*self.deletions, scope, &desired).await
            })
            .await
    }
}
