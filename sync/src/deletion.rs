//! Deferred channel deletion.
//!
//! A channel that drops out of the desired topology is renamed out of the
//! way immediately and deleted only after a fixed delay, so a solve that is
//! quickly reverted never loses an irreplaceable channel. The delay is not
//! cancellable: if the channel is wanted again, a later sync recreates it
//! under its real name and the delayed delete removes only the renamed
//! orphan.

use crate::remote::TopologyApi;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_DELETION_DELAY: Duration = Duration::from_secs(15 * 60);

/// One destructive operation deferred by a fixed delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDeletion {
    pub scope: String,
    pub channel_id: String,
    pub scheduled_at: DateTime<Utc>,
}

/// Delayed-execution worker: fires each payload at least once, eventually.
/// Double execution must be harmless, so the delete path treats "already
/// gone" as done.
#[async_trait]
pub trait DeletionQueue: Send + Sync {
    async fn schedule(&self, deletion: PendingDeletion);
}

/// Timer-backed queue: one sleeping task per pending deletion.
pub struct TokioDeletionQueue {
    api: Arc<dyn TopologyApi>,
    delay: Duration,
}

impl TokioDeletionQueue {
    pub fn new(api: Arc<dyn TopologyApi>) -> Self {
        Self::with_delay(api, DEFAULT_DELETION_DELAY)
    }

    pub fn with_delay(api: Arc<dyn TopologyApi>, delay: Duration) -> Self {
        Self { api, delay }
    }
}

#[async_trait]
impl DeletionQueue for TokioDeletionQueue {
    async fn schedule(&self, deletion: PendingDeletion) {
        let api = Arc::clone(&self.api);
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // No re-check before deleting: if the channel became desired
            // again, a later sync has already recreated it under its real
            // name, and this id points at the renamed orphan.
            match api.delete_entity(&deletion.channel_id).await {
                Ok(()) => {
                    tracing::info!(
                        channel = %deletion.channel_id,
                        scope = %deletion.scope,
                        "deferred channel delete completed"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        channel = %deletion.channel_id,
                        scope = %deletion.scope,
                        %err,
                        "deferred channel delete failed"
                    );
                }
            }
        });
    }
}

impl PendingDeletion {
    /// A deletion scheduled now.
    pub fn now(scope: &str, channel_id: &str) -> Self {
        Self {
            scope: scope.to_owned(),
            channel_id: channel_id.to_owned(),
            scheduled_at: Utc::now(),
        }
    }
}
