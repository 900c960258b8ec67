//! Per-target serialization of reconciliation runs.

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

/// At most one reconciliation per target at a time.
///
/// The algorithm reads-then-writes remote state across several network
/// calls, so overlapping runs for one target must queue, never interleave.
/// A queued caller runs against whatever the desired state is once it gets
/// the lock, so rapid repeated triggers coalesce in effect.
#[derive(Default)]
pub struct SyncSerializer {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SyncSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run_exclusive<F, Fut, T>(&self, target: &str, run: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lock = self.locks.entry(target.to_owned()).or_default().clone();
        let _guard = lock.lock().await;
        run().await
    }
}
