use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::entity::{
    Entity, EntityData, EntityId, EntityKind, IdAllocator, IdRange, Tags, WorldBounds,
};
use crate::replication::UpdateKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Canonical state: decides hits, lifetimes and spawns.
    Authority,
    /// Local copy of someone else's state: predicts motion only.
    Mirror,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    Added { id: EntityId, kind: EntityKind },
    Removed(Entity),
    Changed { id: EntityId, update: UpdateKind },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    #[error("entity ids exhausted in {0:?}")]
    IdsExhausted(IdRange),
    #[error("entity {0} already exists")]
    DuplicateId(EntityId),
    #[error("parent {0} does not exist")]
    MissingParent(EntityId),
}

#[derive(Debug)]
pub struct World {
    role: Role,
    entities: BTreeMap<EntityId, Entity>,
    ids: IdAllocator,
    rng: StdRng,
    events: Vec<WorldEvent>,
}

impl World {
    pub fn new(role: Role, seed: u64) -> Self {
        let range = match role {
            Role::Authority => IdRange::AUTHORITY,
            Role::Mirror => IdRange::LOCAL,
        };
        Self {
            role,
            entities: BTreeMap::new(),
            ids: IdAllocator::new(range),
            rng: StdRng::seed_from_u64(seed),
            events: Vec::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// An entity together with the world's random source.
    pub fn get_mut_with_rng(&mut self, id: EntityId) -> Option<(&mut Entity, &mut StdRng)> {
        let entity = self.entities.get_mut(&id)?;
        Some((entity, &mut self.rng))
    }

    pub fn spawn(&mut self, data: EntityData) -> Result<EntityId, WorldError> {
        let id = self
            .ids
            .allocate()
            .ok_or(WorldError::IdsExhausted(self.ids.range()))?;
        self.attach(Entity::new(id, data));
        Ok(id)
    }

    pub fn spawn_child(&mut self, parent: EntityId, data: EntityData) -> Result<EntityId, WorldError> {
        if !self.entities.contains_key(&parent) {
            return Err(WorldError::MissingParent(parent));
        }
        let id = self
            .ids
            .allocate()
            .ok_or(WorldError::IdsExhausted(self.ids.range()))?;
        self.attach(Entity::new(id, data).with_parent(parent));
        Ok(id)
    }

    /// Adds an entity whose id was assigned elsewhere.
    pub fn insert(&mut self, entity: Entity) -> Result<EntityId, WorldError> {
        let id = entity.id();
        if self.entities.contains_key(&id) {
            return Err(WorldError::DuplicateId(id));
        }
        if let Some(parent) = entity.parent() {
            if !self.entities.contains_key(&parent) {
                return Err(WorldError::MissingParent(parent));
            }
        }
        self.ids.reserve(id);
        self.attach(entity);
        Ok(id)
    }

    fn attach(&mut self, entity: Entity) {
        let (id, kind) = (entity.id(), entity.kind());
        self.entities.insert(id, entity);
        self.events.push(WorldEvent::Added { id, kind });
    }

    /// Removes an entity and, before it, all of its descendants. Returns the
    /// ids removed, children first.
    pub fn remove(&mut self, id: EntityId) -> Vec<EntityId> {
        let mut removed = Vec::new();
        self.remove_into(id, &mut removed);
        removed
    }

    fn remove_into(&mut self, id: EntityId, removed: &mut Vec<EntityId>) {
        if !self.entities.contains_key(&id) {
            return;
        }
        for child in self.children(id) {
            self.remove_into(child, removed);
        }
        if let Some(entity) = self.entities.remove(&id) {
            removed.push(id);
            self.events.push(WorldEvent::Removed(entity));
        }
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    pub fn find_all_with_tag(&self, tag: Tags) -> impl Iterator<Item = &Entity> {
        self.entities.values().filter(move |e| e.has_tag(tag))
    }

    pub fn ids_with_tag(&self, tag: Tags) -> Vec<EntityId> {
        self.find_all_with_tag(tag).map(Entity::id).collect()
    }

    pub fn children(&self, parent: EntityId) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| e.parent() == Some(parent))
            .map(Entity::id)
            .collect()
    }

    pub fn bounds(&self) -> Option<WorldBounds> {
        self.entities.values().find_map(|e| match &e.data {
            EntityData::WorldBounds(b) => Some(*b),
            _ => None,
        })
    }

    /// Asks the owning session to replicate `id` with `update` this cycle.
    pub fn request_update(&mut self, id: EntityId, update: UpdateKind) {
        if self.entities.contains_key(&id) {
            self.events.push(WorldEvent::Changed { id, update });
        }
    }

    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Asteroid, Player, Ship, ShipConfig};

    #[test]
    fn authority_ids_start_low() {
        let mut world = World::new(Role::Authority, 1);
        let id = world.spawn(EntityData::Asteroid(Asteroid::default())).unwrap();
        assert_eq!(id, EntityId(1));
        let mut mirror = World::new(Role::Mirror, 1);
        let local = mirror.spawn(EntityData::Asteroid(Asteroid::default())).unwrap();
        assert!(!local.is_authority());
    }

    #[test]
    fn remove_cascades_children_first() {
        let mut world = World::new(Role::Authority, 1);
        let player = world.spawn(EntityData::Player(Player::default())).unwrap();
        let ship = world
            .spawn_child(player, EntityData::Ship(Ship::new(player, &ShipConfig::default())))
            .unwrap();
        world.drain_events();

        assert_eq!(world.remove(player), vec![ship, player]);
        assert!(world.is_empty());
        let events = world.drain_events();
        assert!(matches!(&events[0], WorldEvent::Removed(e) if e.id() == ship));
        assert!(world.remove(player).is_empty());
    }

    #[test]
    fn insert_rejects_duplicates_and_orphans() {
        let mut world = World::new(Role::Mirror, 1);
        let entity = Entity::new(EntityId(5), EntityData::Asteroid(Asteroid::default()));
        world.insert(entity.clone()).unwrap();
        assert_eq!(world.insert(entity), Err(WorldError::DuplicateId(EntityId(5))));

        let orphan = Entity::new(
            EntityId(6),
            EntityData::Ship(Ship::new(EntityId(99), &ShipConfig::default())),
        )
        .with_parent(EntityId(99));
        assert_eq!(world.insert(orphan), Err(WorldError::MissingParent(EntityId(99))));
    }

    #[test]
    fn tag_queries() {
        let mut world = World::new(Role::Authority, 1);
        world.spawn(EntityData::WorldBounds(WorldBounds::default())).unwrap();
        world.spawn(EntityData::Asteroid(Asteroid::default())).unwrap();
        assert_eq!(world.ids_with_tag(Tags::COLLIDABLE).len(), 1);
        assert_eq!(world.ids_with_tag(Tags::NETWORK).len(), 2);
        assert!(world.bounds().is_some());
    }

    #[test]
    fn update_requests_ignore_unknown_ids() {
        let mut world = World::new(Role::Authority, 1);
        world.request_update(EntityId(77), UpdateKind::Default);
        assert!(world.drain_events().is_empty());
    }
}
