use std::collections::{HashSet, VecDeque};

use log::{debug, trace, warn};

use super::smoothing::Smoothing;
use crate::entity::{Entity, EntityData, EntityId, EntityKind, Tags};
use crate::replication::{DecodeError, SnapshotBatch, UpdateKind, WireObject, decode};
use crate::world::World;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReconcileReport {
    pub batches: usize,
    pub created: Vec<EntityId>,
    pub updated: usize,
    /// Mirrors removed by delete objects, children included.
    pub deleted: Vec<EntityId>,
    /// Mirrors removed because a full listing no longer had them.
    pub pruned: Vec<EntityId>,
    /// Creations skipped because their owner is not mirrored yet.
    pub missing_owner: usize,
    /// Updates for objects this side never saw created.
    pub unintroduced: usize,
    pub unknown_kind: usize,
    /// Listings that completed with chunks missing; nothing was pruned.
    pub broken_listings: usize,
}

impl ReconcileReport {
    /// True when the mirror is known to be behind and a fresh full listing
    /// would help.
    pub fn has_gaps(&self) -> bool {
        self.missing_owner > 0 || self.unintroduced > 0 || self.broken_listings > 0
    }

    fn absorb(&mut self, other: ReconcileReport) {
        self.batches += other.batches;
        self.created.extend(other.created);
        self.updated += other.updated;
        self.deleted.extend(other.deleted);
        self.pruned.extend(other.pruned);
        self.missing_owner += other.missing_owner;
        self.unintroduced += other.unintroduced;
        self.unknown_kind += other.unknown_kind;
        self.broken_listings += other.broken_listings;
    }
}

/// Applies authority batches to a mirror world, in arrival order.
#[derive(Debug, Default)]
pub struct Reconciler {
    pending: VecDeque<SnapshotBatch>,
    /// Authority objects this side already tore down on its own. Late
    /// updates for them are expected and are not gaps.
    retired: HashSet<EntityId>,
    listing: ListingProgress,
}

/// Ids and chunk count seen so far of the listing being received.
#[derive(Debug, Default)]
struct ListingProgress {
    ids: HashSet<EntityId>,
    chunks: u16,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a batch for the next `apply_pending`.
    pub fn enqueue(&mut self, batch: SnapshotBatch) {
        self.pending.push_back(batch);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Marks an authority object as removed locally ahead of its delete.
    pub fn retire(&mut self, id: EntityId) {
        if id.is_authority() {
            self.retired.insert(id);
        }
    }

    pub fn is_retired(&self, id: EntityId) -> bool {
        self.retired.contains(&id)
    }

    pub fn apply_pending(
        &mut self,
        world: &mut World,
        drift_ms: u64,
        now_ms: u64,
    ) -> Result<ReconcileReport, DecodeError> {
        let mut report = ReconcileReport::default();
        while let Some(batch) = self.pending.pop_front() {
            let applied = self.apply_batch(world, &batch, drift_ms, now_ms)?;
            report.absorb(applied);
        }
        if report.batches > 0 {
            debug!(
                "reconciled {} batches: {} created, {} updated, {} deleted, {} pruned",
                report.batches,
                report.created.len(),
                report.updated,
                report.deleted.len(),
                report.pruned.len()
            );
        }
        Ok(report)
    }

    /// Applies one batch. Objects are processed in listing order, so an owner
    /// created earlier in the batch satisfies later references to it.
    pub fn apply_batch(
        &mut self,
        world: &mut World,
        batch: &SnapshotBatch,
        drift_ms: u64,
        now_ms: u64,
    ) -> Result<ReconcileReport, DecodeError> {
        let mut report = ReconcileReport {
            batches: 1,
            ..Default::default()
        };
        let anchor_ms = now_ms.saturating_sub(drift_ms + batch.send_lag());

        for object in &batch.objects {
            if object.update == UpdateKind::Delete {
                self.retired.remove(&object.id);
                report.deleted.extend(world.remove(object.id));
                continue;
            }
            if world.contains(object.id) {
                update_mirror(world, object, anchor_ms)?;
                report.updated += 1;
                continue;
            }
            if self.retired.contains(&object.id) {
                trace!("{} {} was retired locally, ignoring", object.kind, object.id);
                continue;
            }
            if object.update != UpdateKind::Full {
                trace!("{} {} was never introduced, ignoring {:?}", object.kind, object.id, object.update);
                report.unintroduced += 1;
                continue;
            }
            match create_mirror(world, object)? {
                Creation::Created => report.created.push(object.id),
                Creation::MissingOwner => report.missing_owner += 1,
                Creation::UnknownKind => report.unknown_kind += 1,
            }
        }

        if let Some(chunk) = batch.listing {
            if chunk.index == 0 {
                self.listing = ListingProgress::default();
            }
            self.listing.chunks += 1;
            self.listing.ids.extend(batch.objects.iter().map(|o| o.id));
        }

        if batch.full_sync {
            let listing = std::mem::take(&mut self.listing);
            let listed = match batch.listing {
                None => batch.objects.iter().map(|o| o.id).collect(),
                Some(chunk) if listing.chunks == chunk.count => listing.ids,
                Some(chunk) => {
                    debug!("listing ended with {} of {} chunks", listing.chunks, chunk.count);
                    report.broken_listings += 1;
                    return Ok(report);
                }
            };
            self.retired.retain(|id| listed.contains(id));
            report.pruned = prune(world, &listed);
        }
        Ok(report)
    }
}

enum Creation {
    Created,
    MissingOwner,
    UnknownKind,
}

fn create_mirror(world: &mut World, object: &WireObject) -> Result<Creation, DecodeError> {
    let Some(kind) = EntityKind::from_wire_name(&object.kind) else {
        warn!("unknown object type {:?} for {}", object.kind, object.id);
        return Ok(Creation::UnknownKind);
    };

    let owner = match kind.owner_kind() {
        None => None,
        Some(owner_kind) => {
            let owner = object.get("owner").and_then(|v| v.as_id());
            match owner {
                Some(owner) if world.get(owner).is_some_and(|e| e.kind() == owner_kind) => {
                    Some(owner)
                }
                _ => {
                    trace!("{} {}: owner {:?} not mirrored yet", object.kind, object.id, owner);
                    return Ok(Creation::MissingOwner);
                }
            }
        }
    };

    let Some(data) = EntityData::blank(kind, owner) else {
        return Ok(Creation::MissingOwner);
    };
    let mut entity = Entity::new(object.id, data);
    if kind == EntityKind::Ship {
        entity.set_parent(owner);
    }
    decode(object, &mut entity, true)?;

    if let Err(e) = world.insert(entity) {
        warn!("cannot mirror {} {}: {}", object.kind, object.id, e);
        return Ok(Creation::MissingOwner);
    }
    Ok(Creation::Created)
}

fn update_mirror(world: &mut World, object: &WireObject, anchor_ms: u64) -> Result<(), DecodeError> {
    let Some(entity) = world.get_mut(object.id) else {
        return Ok(());
    };
    let predicted = entity.body().map(|b| b.position);
    decode(object, entity, false)?;

    // Absent fields leave the body as predicted, which then is the target.
    if let Some(predicted) = predicted {
        let no_lerp = object.update == UpdateKind::NoLerp;
        if let Some(body) = entity.body_mut() {
            let smoothing = Smoothing::retarget(body, predicted, anchor_ms, no_lerp);
            entity.smoothing = Some(smoothing);
        }
    }
    Ok(())
}

fn prune(world: &mut World, listed: &HashSet<EntityId>) -> Vec<EntityId> {
    let stale: Vec<EntityId> = world
        .iter()
        .filter(|e| e.id().is_authority() && e.has_tag(Tags::NETWORK))
        .filter(|e| !e.has_tag(Tags::EXPLOSION) && !listed.contains(&e.id()))
        .map(Entity::id)
        .collect();
    let mut pruned = Vec::new();
    for id in stale {
        pruned.extend(world.remove(id));
    }
    if !pruned.is_empty() {
        debug!("pruned {} stale mirrors", pruned.len());
    }
    pruned
}
