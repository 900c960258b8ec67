//! Reconciler integration tests against an in-memory remote scope.

use async_trait::async_trait;
use huntboard_sync::{
    reconcile, DeletionQueue, DesiredTopology, EntityKind, EntityUpdate, PendingDeletion,
    RemoteEntity, SyncEngine, SyncError, TokioDeletionQueue, TopologyApi, OBSOLETE_PREFIX,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory remote scope that records every mutation.
#[derive(Default)]
struct FakeApi {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    entities: Vec<RemoteEntity>,
    next_id: u64,
    creates: usize,
    updates: usize,
    deletes: usize,
}

impl FakeApi {
    /// Pre-populate the scope, as an operator or a prior run would have.
    fn seed(&self, kind: EntityKind, name: &str, parent_id: Option<&str>) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("seed-{}", state.next_id);
        state.entities.push(RemoteEntity {
            id: id.clone(),
            name: name.to_owned(),
            kind,
            parent_id: parent_id.map(str::to_owned),
        });
        id
    }

    fn entities(&self) -> Vec<RemoteEntity> {
        self.state.lock().unwrap().entities.clone()
    }

    fn named(&self, name: &str) -> Vec<RemoteEntity> {
        self.entities()
            .into_iter()
            .filter(|entity| entity.name == name)
            .collect()
    }

    fn mutations(&self) -> (usize, usize, usize) {
        let state = self.state.lock().unwrap();
        (state.creates, state.updates, state.deletes)
    }
}

#[async_trait]
impl TopologyApi for FakeApi {
    async fn list_entities(&self, _scope: &str) -> Result<Vec<RemoteEntity>, SyncError> {
        Ok(self.entities())
    }

    async fn create_entity(
        &self,
        _scope: &str,
        kind: EntityKind,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<RemoteEntity, SyncError> {
        let mut state = self.state.lock().unwrap();
        state.creates += 1;
        state.next_id += 1;
        let entity = RemoteEntity {
            id: format!("e{}", state.next_id),
            name: name.to_owned(),
            kind,
            parent_id: parent_id.map(str::to_owned),
        };
        state.entities.push(entity.clone());
        Ok(entity)
    }

    async fn update_entity(&self, id: &str, update: EntityUpdate) -> Result<(), SyncError> {
        let mut state = self.state.lock().unwrap();
        state.updates += 1;
        if let Some(entity) = state.entities.iter_mut().find(|entity| entity.id == id) {
            if let Some(name) = update.name {
                entity.name = name;
            }
            if let Some(parent_id) = update.parent_id {
                entity.parent_id = Some(parent_id);
            }
        }
        Ok(())
    }

    async fn delete_entity(&self, id: &str) -> Result<(), SyncError> {
        let mut state = self.state.lock().unwrap();
        state.deletes += 1;
        state.entities.retain(|entity| entity.id != id);
        Ok(())
    }
}

/// Records scheduled deletions without executing them.
#[derive(Default)]
struct FakeQueue {
    scheduled: Mutex<Vec<PendingDeletion>>,
}

impl FakeQueue {
    fn scheduled(&self) -> Vec<PendingDeletion> {
        self.scheduled.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeletionQueue for FakeQueue {
    async fn schedule(&self, deletion: PendingDeletion) {
        self.scheduled.lock().unwrap().push(deletion);
    }
}

fn desired(rounds: &[&str], channels: &[(&str, &str)]) -> DesiredTopology {
    let mut desired = DesiredTopology::new();
    for round in rounds {
        desired.add_round(round);
    }
    for (name, round) in channels {
        desired.add_channel(name, round);
    }
    desired
}

#[tokio::test]
async fn creates_missing_categories_and_channels() {
    let api = FakeApi::default();
    let queue = FakeQueue::default();

    let report = reconcile(
        &api,
        &queue,
        "guild-1",
        &desired(&[], &[("Alpha", "Round 1")]),
    )
    .await
    .unwrap();

    assert_eq!(report.categories_created, 1);
    assert_eq!(report.channels_created, 1);

    let categories = api.named("Round 1");
    assert_eq!(categories[0].kind, EntityKind::Category);
    let channels = api.named("Alpha");
    assert_eq!(channels[0].kind, EntityKind::Voice);
    assert_eq!(
        channels[0].parent_id.as_deref(),
        Some(categories[0].id.as_str())
    );
}

#[tokio::test]
async fn a_second_run_issues_no_remote_calls() {
    let api = FakeApi::default();
    let queue = FakeQueue::default();
    let desired = desired(&[], &[("Alpha", "Round 1"), ("Beta", "Round 1")]);

    reconcile(&api, &queue, "guild-1", &desired).await.unwrap();
    let before = api.mutations();

    let report = reconcile(&api, &queue, "guild-1", &desired).await.unwrap();
    assert!(report.is_noop());
    assert_eq!(api.mutations(), before);
}

#[tokio::test]
async fn duplicate_names_are_healed_down_to_one() {
    let api = FakeApi::default();
    let queue = FakeQueue::default();
    let category = api.seed(EntityKind::Category, "Round 1", None);
    for _ in 0..3 {
        api.seed(EntityKind::Voice, "Alpha", Some(&category));
    }

    let report = reconcile(
        &api,
        &queue,
        "guild-1",
        &desired(&[], &[("Alpha", "Round 1")]),
    )
    .await
    .unwrap();

    assert_eq!(report.duplicates_removed, 2);
    assert_eq!(api.named("Alpha").len(), 1);
}

#[tokio::test]
async fn unneeded_channels_are_renamed_and_deferred_never_deleted_inline() {
    let api = FakeApi::default();
    let queue = FakeQueue::default();
    let category = api.seed(EntityKind::Category, "Round 1", None);
    let channel = api.seed(EntityKind::Voice, "Alpha", Some(&category));

    // Alpha was solved: the round keeps its category, the channel must go.
    let report = reconcile(&api, &queue, "guild-1", &desired(&["Round 1"], &[]))
        .await
        .unwrap();

    assert_eq!(report.channels_marked_obsolete, 1);
    assert_eq!(report.deletions_scheduled, 1);
    assert_eq!(api.mutations().2, 0, "no synchronous delete");

    let renamed = api
        .entities()
        .into_iter()
        .find(|entity| entity.id == channel)
        .expect("channel must survive the run");
    assert!(renamed.name.starts_with(OBSOLETE_PREFIX));

    let scheduled = queue.scheduled();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].channel_id, channel);
    assert_eq!(scheduled[0].scope, "guild-1");
}

#[tokio::test]
async fn already_marked_channels_are_not_renamed_again() {
    let api = FakeApi::default();
    let queue = FakeQueue::default();
    api.seed(EntityKind::Category, "Round 1", None);
    api.seed(EntityKind::Voice, "Alpha", None);
    let wanted = desired(&["Round 1"], &[]);

    reconcile(&api, &queue, "guild-1", &wanted).await.unwrap();
    let report = reconcile(&api, &queue, "guild-1", &wanted).await.unwrap();

    assert_eq!(report.channels_marked_obsolete, 0);
    // The deferred delete is re-enqueued each pass; firing twice is harmless.
    assert_eq!(report.deletions_scheduled, 1);
    assert_eq!(queue.scheduled().len(), 2);
}

#[tokio::test]
async fn unneeded_categories_are_deleted_immediately() {
    let api = FakeApi::default();
    let queue = FakeQueue::default();
    api.seed(EntityKind::Category, "Old Round", None);

    let report = reconcile(&api, &queue, "guild-1", &desired(&["Round 1"], &[]))
        .await
        .unwrap();

    assert_eq!(report.categories_deleted, 1);
    assert!(api.named("Old Round").is_empty());
    assert_eq!(api.named("Round 1").len(), 1);
}

#[tokio::test]
async fn misparented_channels_are_reattached() {
    let api = FakeApi::default();
    let queue = FakeQueue::default();
    let round_one = api.seed(EntityKind::Category, "Round 1", None);
    let round_two = api.seed(EntityKind::Category, "Round 2", None);
    let channel = api.seed(EntityKind::Voice, "Alpha", Some(&round_two));

    let report = reconcile(
        &api,
        &queue,
        "guild-1",
        &desired(&["Round 2"], &[("Alpha", "Round 1")]),
    )
    .await
    .unwrap();

    assert_eq!(report.channels_reparented, 1);
    let moved = api
        .entities()
        .into_iter()
        .find(|entity| entity.id == channel)
        .unwrap();
    assert_eq!(moved.parent_id.as_deref(), Some(round_one.as_str()));
}

#[tokio::test]
async fn engine_reconciles_with_desired_state_resolved_under_the_lock() {
    let api = Arc::new(FakeApi::default());
    let queue = Arc::new(FakeQueue::default());
    let engine = SyncEngine::new(api.clone(), queue.clone());

    let wanted = desired(&[], &[("Alpha", "Round 1")]);
    let report = engine
        .sync_workspace("guild-1", || async move { Ok(wanted) })
        .await
        .unwrap();

    assert_eq!(report.categories_created, 1);
    assert_eq!(report.channels_created, 1);
}

#[tokio::test]
async fn a_failed_desired_derivation_touches_nothing_remote() {
    let api = Arc::new(FakeApi::default());
    let queue = Arc::new(FakeQueue::default());
    let engine = SyncEngine::new(api.clone(), queue.clone());

    let err = engine
        .sync_workspace("guild-1", || async {
            Err(SyncError::Desired("workspace load failed".to_owned()))
        })
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Desired(_)));
    assert_eq!(api.mutations(), (0, 0, 0));
}

#[tokio::test(start_paused = true)]
async fn deferred_deletes_fire_after_the_delay_and_tolerate_repeats() {
    let api = Arc::new(FakeApi::default());
    let id = api.seed(EntityKind::Voice, "zzz-defunct-seed-1", None);
    let queue = TokioDeletionQueue::with_delay(api.clone(), Duration::from_secs(900));

    // A second pass re-enqueued the same channel before the first fired.
    queue.schedule(PendingDeletion::now("guild-1", &id)).await;
    queue.schedule(PendingDeletion::now("guild-1", &id)).await;

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(api.entities().len(), 1, "deletion must wait out the delay");

    tokio::time::sleep(Duration::from_secs(900)).await;
    assert!(api.entities().is_empty());
    // Both timers fired; deleting the already-gone channel succeeded.
    assert_eq!(api.mutations().2, 2);
}
