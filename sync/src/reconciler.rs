//! The sync algorithm: minimal create/update/delete against remote state.
//!
//! The remote scope is not exclusively ours (operators edit it by hand, and
//! prior runs may have died mid-way), so every pass re-lists, heals
//! duplicates first, and writes idempotently. A failed run leaves whatever
//! it applied in place; the next run completes the remainder.

use crate::deletion::{DeletionQueue, PendingDeletion};
use crate::error::SyncError;
use crate::remote::{EntityKind, EntityUpdate, RemoteEntity, TopologyApi};
use crate::topology::DesiredTopology;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Prefix stamped onto channels that fell out of the desired topology and
/// are waiting for their deferred delete.
pub const OBSOLETE_PREFIX: &str = "zzz-defunct-";

/// Counters from one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub duplicates_removed: usize,
    pub categories_created: usize,
    pub channels_created: usize,
    pub channels_reparented: usize,
    pub channels_marked_obsolete: usize,
    pub deletions_scheduled: usize,
    pub categories_deleted: usize,
}

impl SyncReport {
    /// True when the run issued no remote mutations. Scheduling a deferred
    /// deletion is not a remote call and does not count.
    pub fn is_noop(&self) -> bool {
        self.duplicates_removed == 0
            && self.categories_created == 0
            && self.channels_created == 0
            && self.channels_reparented == 0
            && self.channels_marked_obsolete == 0
            && self.categories_deleted == 0
    }
}

/// Bring the remote scope's topology in line with `desired`.
///
/// Callers must serialize runs per scope (see
/// [`crate::serializer::SyncSerializer`]); the algorithm reads-then-writes
/// across several network calls and does not tolerate interleaving.
pub async fn reconcile(
    api: &dyn TopologyApi,
    deletions: &dyn DeletionQueue,
    scope: &str,
    desired: &DesiredTopology,
) -> Result<SyncReport, SyncError> {
    let mut report = SyncReport::default();

    // Re-list and heal name duplicates before diffing. Partial prior runs
    // and manual edits both produce duplicates; keep the first of each name
    // per kind and delete the rest.
    let listed = api.list_entities(scope).await?;
    let mut seen: HashSet<(EntityKind, String)> = HashSet::new();
    let mut entities = Vec::with_capacity(listed.len());
    for entity in listed {
        if seen.insert((entity.kind, entity.name.clone())) {
            entities.push(entity);
        } else {
            tracing::info!(scope, name = %entity.name, id = %entity.id, "removing duplicate entity");
            api.delete_entity(&entity.id).await?;
            report.duplicates_removed += 1;
        }
    }

    let (categories, channels): (Vec<RemoteEntity>, Vec<RemoteEntity>) = entities
        .into_iter()
        .partition(|entity| entity.kind == EntityKind::Category);

    // Ensure a category per desired round; remember every category id,
    // pre-existing or fresh, for parent resolution.
    let mut category_ids: BTreeMap<String, String> = categories
        .iter()
        .map(|category| (category.name.clone(), category.id.clone()))
        .collect();
    for round in desired.rounds() {
        if !category_ids.contains_key(round) {
            let created = api
                .create_entity(scope, EntityKind::Category, round, None)
                .await?;
            report.categories_created += 1;
            category_ids.insert(round.clone(), created.id);
        }
    }

    // Ensure a channel per desired puzzle, under the right parent.
    let existing_channels: BTreeMap<&str, &RemoteEntity> = channels
        .iter()
        .map(|channel| (channel.name.as_str(), channel))
        .collect();
    for (name, round) in desired.channels() {
        // Every desired channel's round is in desired.rounds(), so the
        // category id is always resolvable after the step above.
        let Some(parent_id) = category_ids.get(round) else {
            continue;
        };
        match existing_channels.get(name.as_str()) {
            None => {
                api.create_entity(scope, EntityKind::Voice, name, Some(parent_id))
                    .await?;
                report.channels_created += 1;
            }
            Some(channel) if channel.parent_id.as_deref() != Some(parent_id.as_str()) => {
                api.update_entity(
                    &channel.id,
                    EntityUpdate {
                        parent_id: Some(parent_id.clone()),
                        ..EntityUpdate::default()
                    },
                )
                .await?;
                report.channels_reparented += 1;
            }
            Some(_) => {}
        }
    }

    // Channels that fell out of the desired set: rename out of the way now,
    // delete later. Never delete synchronously here.
    for channel in &channels {
        if desired.channels().contains_key(channel.name.as_str()) {
            continue;
        }
        if !channel.name.starts_with(OBSOLETE_PREFIX) {
            api.update_entity(
                &channel.id,
                EntityUpdate {
                    name: Some(obsolete_name(&channel.id)),
                    ..EntityUpdate::default()
                },
            )
            .await?;
            report.channels_marked_obsolete += 1;
        }
        deletions
            .schedule(PendingDeletion::now(scope, &channel.id))
            .await;
        report.deletions_scheduled += 1;
    }

    // Categories with no desired round are cheap to recreate; delete now.
    for category in &categories {
        if !desired.rounds().contains(category.name.as_str()) {
            api.delete_entity(&category.id).await?;
            report.categories_deleted += 1;
        }
    }

    if !report.is_noop() {
        tracing::info!(scope, ?report, "topology reconciled");
    }
    Ok(report)
}

fn obsolete_name(id: &str) -> String {
    format!("{OBSOLETE_PREFIX}{id}")
}
