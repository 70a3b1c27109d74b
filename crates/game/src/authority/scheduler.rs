use std::collections::HashMap;

use log::trace;

use crate::entity::{EntityId, EntityKind, Tags};
use crate::net::PeerId;
use crate::replication::{
    ListingChunk, SnapshotBatch, UpdateKind, WireObject, encode, has_optional_fields,
    refresh_shadow,
};
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastConfig {
    /// Minimum spacing of the steady delta sweep.
    pub min_interval_ms: u64,
    /// Batches are split into chunks of at most this many objects.
    pub max_batch_objects: usize,
    /// Archived object bytes allowed in one chunk. Leaves headroom under the
    /// datagram limit for the packet and batch envelope.
    pub max_batch_bytes: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 50,
            max_batch_objects: 64,
            max_batch_bytes: 48_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    All,
    Peer(PeerId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub target: Target,
    pub batch: SnapshotBatch,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    id: EntityId,
    kind: EntityKind,
    update: UpdateKind,
}

/// Collects update requests during a tick and turns them into batches.
#[derive(Debug, Default)]
pub struct BroadcastScheduler {
    config: BroadcastConfig,
    queue: Vec<Pending>,
    queued: HashMap<EntityId, usize>,
    joining: Vec<PeerId>,
    last_sweep_ms: Option<u64>,
}

impl BroadcastScheduler {
    pub fn new(config: BroadcastConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    /// Queues `id` for this cycle. A second request for the same entity is
    /// merged into the first, the stronger kind winning.
    pub fn request(&mut self, id: EntityId, kind: EntityKind, update: UpdateKind) {
        match self.queued.get(&id) {
            Some(&index) => {
                let pending = &mut self.queue[index];
                pending.update = pending.update.merge(update);
            }
            None => {
                self.queued.insert(id, self.queue.len());
                self.queue.push(Pending { id, kind, update });
            }
        }
    }

    /// Sends `peer` a full listing on the next flush.
    pub fn introduce(&mut self, peer: PeerId) {
        if !self.joining.contains(&peer) {
            self.joining.push(peer);
        }
    }

    pub fn forget(&mut self, peer: PeerId) {
        self.joining.retain(|p| *p != peer);
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Builds this cycle's batches. Joining peers get a full listing each,
    /// chunked to fit datagrams; everyone gets the queued updates plus, when
    /// due, the steady sweep.
    pub fn flush(&mut self, world: &mut World, now_ms: u64, last_tick_ms: u64) -> Vec<Outbound> {
        let mut out = Vec::new();

        if !self.joining.is_empty() {
            let listing = self.full_listing(world, now_ms, last_tick_ms);
            for peer in self.joining.drain(..) {
                out.extend(listing.iter().map(|batch| Outbound {
                    target: Target::Peer(peer),
                    batch: batch.clone(),
                }));
            }
        }

        let sweep_due = self
            .last_sweep_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.config.min_interval_ms);
        if sweep_due {
            self.last_sweep_ms = Some(now_ms);
            for entity in world.find_all_with_tag(Tags::STEADY) {
                let (id, kind) = (entity.id(), entity.kind());
                if !self.queued.contains_key(&id) {
                    self.queued.insert(id, self.queue.len());
                    self.queue.push(Pending {
                        id,
                        kind,
                        update: UpdateKind::Delta,
                    });
                }
            }
        }

        let queue = std::mem::take(&mut self.queue);
        self.queued.clear();

        let mut objects = Vec::new();
        let mut sent = Vec::new();
        for pending in queue {
            if pending.update == UpdateKind::Delete {
                objects.push(WireObject::delete(pending.kind.wire_name(), pending.id));
                continue;
            }
            let Some(entity) = world.get(pending.id) else {
                continue;
            };
            let mut wire = encode(entity, pending.update.changes_only());
            wire.update = pending.update;
            if pending.update != UpdateKind::Full && !has_optional_fields(&wire, entity.layout()) {
                trace!("{} {}: nothing changed", wire.kind, wire.id);
                continue;
            }
            if pending.update != UpdateKind::NoLerp {
                sent.push(pending.id);
            }
            objects.push(wire);
        }

        for id in sent {
            if let Some(entity) = world.get_mut(id) {
                refresh_shadow(entity);
            }
        }

        for chunk in self.pack(objects) {
            let mut batch = self.batch(now_ms, last_tick_ms);
            batch.objects = chunk;
            out.push(Outbound {
                target: Target::All,
                batch,
            });
        }
        out
    }

    /// Every live replicated entity as full objects, owners listed first.
    /// Only the last chunk is marked `full_sync`, so a mirror prunes once it
    /// has seen the whole listing.
    fn full_listing(&self, world: &World, now_ms: u64, last_tick_ms: u64) -> Vec<SnapshotBatch> {
        let mut entities: Vec<_> = world.find_all_with_tag(Tags::NETWORK).collect();
        entities.sort_by_key(|e| (e.kind().listing_rank(), e.id()));
        let objects = entities.into_iter().map(|e| encode(e, false)).collect();

        let mut chunks = self.pack(objects);
        if chunks.is_empty() {
            chunks.push(Vec::new());
        }
        let count = u16::try_from(chunks.len()).unwrap_or(u16::MAX);
        chunks
            .into_iter()
            .enumerate()
            .map(|(index, objects)| {
                let chunk = ListingChunk {
                    index: u16::try_from(index).unwrap_or(u16::MAX),
                    count,
                };
                let mut batch = self.batch(now_ms, last_tick_ms);
                batch.full_sync = chunk.is_last();
                batch.listing = Some(chunk);
                batch.objects = objects;
                batch
            })
            .collect()
    }

    /// Splits objects into datagram-sized runs, keeping their order.
    fn pack(&self, objects: Vec<WireObject>) -> Vec<Vec<WireObject>> {
        let max_objects = self.config.max_batch_objects.max(1);
        let mut chunks = Vec::new();
        let mut current = Vec::new();
        let mut bytes = 0usize;
        for object in objects {
            let size = object.archived_len();
            let full = current.len() >= max_objects
                || (!current.is_empty() && bytes.saturating_add(size) > self.config.max_batch_bytes);
            if full {
                chunks.push(std::mem::take(&mut current));
                bytes = 0;
            }
            bytes = bytes.saturating_add(size);
            current.push(object);
        }
        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }

    fn batch(&self, now_ms: u64, last_tick_ms: u64) -> SnapshotBatch {
        let interval = u32::try_from(self.config.min_interval_ms).unwrap_or(u32::MAX);
        SnapshotBatch::new(now_ms, interval, last_tick_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Asteroid, EntityData, Player, Ship, ShipConfig, Starfield};
    use crate::world::Role;

    fn objects(out: &[Outbound]) -> Vec<&WireObject> {
        out.iter().flat_map(|o| o.batch.objects.iter()).collect()
    }

    fn world() -> (World, EntityId) {
        let mut world = World::new(Role::Authority, 1);
        let rock = world.spawn(EntityData::Asteroid(Asteroid::default())).unwrap();
        (world, rock)
    }

    #[test]
    fn first_flush_sweeps_then_unchanged_is_dropped() {
        let (mut world, rock) = world();
        let mut scheduler = BroadcastScheduler::new(BroadcastConfig::default());
        let out = scheduler.flush(&mut world, 0, 0);
        assert_eq!(objects(&out).len(), 1);
        assert_eq!(objects(&out)[0].id, rock);

        let out = scheduler.flush(&mut world, 100, 100);
        assert!(out.is_empty());
    }

    #[test]
    fn sweep_waits_for_interval() {
        let (mut world, rock) = world();
        let mut scheduler = BroadcastScheduler::new(BroadcastConfig::default());
        scheduler.flush(&mut world, 0, 0);
        world.get_mut(rock).unwrap().body_mut().unwrap().position.x = 10.0;

        assert!(scheduler.flush(&mut world, 20, 20).is_empty());
        let out = scheduler.flush(&mut world, 50, 50);
        let sent = objects(&out);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].update, UpdateKind::Delta);
        assert!(sent[0].has("position"));
        assert!(!sent[0].has("radius"));
    }

    #[test]
    fn requests_merge_to_strongest() {
        let (mut world, rock) = world();
        let mut scheduler = BroadcastScheduler::new(BroadcastConfig::default());
        scheduler.request(rock, EntityKind::Asteroid, UpdateKind::Default);
        scheduler.request(rock, EntityKind::Asteroid, UpdateKind::Full);
        scheduler.request(rock, EntityKind::Asteroid, UpdateKind::Delta);
        assert_eq!(scheduler.queued_len(), 1);
        let out = scheduler.flush(&mut world, 0, 0);
        assert_eq!(objects(&out)[0].update, UpdateKind::Full);
    }

    #[test]
    fn delete_carries_only_identity() {
        let (mut world, rock) = world();
        world.remove(rock);
        let mut scheduler = BroadcastScheduler::new(BroadcastConfig::default());
        scheduler.request(rock, EntityKind::Asteroid, UpdateKind::Delete);
        let out = scheduler.flush(&mut world, 0, 0);
        let sent = objects(&out);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].update, UpdateKind::Delete);
        assert!(sent[0].fields.is_empty());
        assert_eq!(sent[0].kind, "Asteroid");
    }

    #[test]
    fn no_lerp_keeps_shadow() {
        let (mut world, rock) = world();
        let mut scheduler = BroadcastScheduler::new(BroadcastConfig::default());
        scheduler.flush(&mut world, 0, 0);
        world.get_mut(rock).unwrap().body_mut().unwrap().position.x = 99.0;

        scheduler.request(rock, EntityKind::Asteroid, UpdateKind::NoLerp);
        let out = scheduler.flush(&mut world, 10, 10);
        assert_eq!(objects(&out)[0].update, UpdateKind::NoLerp);

        let out = scheduler.flush(&mut world, 60, 60);
        assert!(objects(&out)[0].has("position"));
    }

    #[test]
    fn joining_peer_gets_ordered_full_listing() {
        let mut world = World::new(Role::Authority, 1);
        world.spawn(EntityData::Starfield(Starfield::default())).unwrap();
        let player = world.spawn(EntityData::Player(Player::default())).unwrap();
        let ship = world
            .spawn_child(player, EntityData::Ship(Ship::new(player, &ShipConfig::default())))
            .unwrap();
        let mut scheduler = BroadcastScheduler::new(BroadcastConfig::default());
        scheduler.flush(&mut world, 0, 0);

        scheduler.introduce(PeerId(7));
        let out = scheduler.flush(&mut world, 10, 10);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].target, Target::Peer(PeerId(7)));
        let listing = &out[0].batch;
        assert!(listing.full_sync);
        assert_eq!(listing.listing, Some(ListingChunk { index: 0, count: 1 }));
        let ids: Vec<_> = listing.objects.iter().map(|o| o.id).collect();
        assert_eq!(&ids[1..], &[player, ship]);
        assert!(listing.objects.iter().all(|o| o.update == UpdateKind::Full));
    }

    #[test]
    fn large_broadcasts_are_split() {
        let mut world = World::new(Role::Authority, 1);
        for _ in 0..5 {
            world.spawn(EntityData::Asteroid(Asteroid::default())).unwrap();
        }
        let mut scheduler = BroadcastScheduler::new(BroadcastConfig {
            max_batch_objects: 2,
            ..Default::default()
        });
        let out = scheduler.flush(&mut world, 0, 0);
        let sizes: Vec<_> = out.iter().map(|o| o.batch.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert!(out.iter().all(|o| o.target == Target::All));
    }

    #[test]
    fn listing_spans_chunks_and_syncs_on_the_last() {
        let mut world = World::new(Role::Authority, 1);
        for _ in 0..7 {
            world.spawn(EntityData::Asteroid(Asteroid::default())).unwrap();
        }
        let mut scheduler = BroadcastScheduler::new(BroadcastConfig {
            max_batch_objects: 3,
            ..Default::default()
        });
        scheduler.flush(&mut world, 0, 0);
        scheduler.introduce(PeerId(2));
        let out = scheduler.flush(&mut world, 10, 10);

        let chunks: Vec<_> = out
            .iter()
            .filter(|o| o.target == Target::Peer(PeerId(2)))
            .map(|o| &o.batch)
            .collect();
        assert_eq!(chunks.len(), 3);
        for (index, batch) in chunks.iter().enumerate() {
            let chunk = batch.listing.unwrap();
            assert_eq!(usize::from(chunk.index), index);
            assert_eq!(chunk.count, 3);
            assert_eq!(batch.full_sync, index == 2);
        }
        let listed: usize = chunks.iter().map(|b| b.len()).sum();
        assert_eq!(listed, 7);
    }

    #[test]
    fn byte_budget_splits_before_count() {
        let mut world = World::new(Role::Authority, 1);
        for _ in 0..4 {
            world.spawn(EntityData::Asteroid(Asteroid::default())).unwrap();
        }
        let mut scheduler = BroadcastScheduler::new(BroadcastConfig {
            max_batch_bytes: 1,
            ..Default::default()
        });
        let out = scheduler.flush(&mut world, 0, 0);
        let sizes: Vec<_> = out.iter().map(|o| o.batch.len()).collect();
        assert_eq!(sizes, vec![1, 1, 1, 1]);
    }
}
