mod background;
mod body;
mod bounds;
mod id;
mod kind;
mod objects;
mod player;
mod ship;
mod special;
mod timer;

use std::sync::LazyLock;

pub use background::{Planet, Repeat, Starfield};
pub use body::{Body, DEFAULT_MIN_SPEED};
pub use bounds::WorldBounds;
pub use id::{EntityId, IdAllocator, IdRange};
pub use kind::{EntityKind, Tags};
pub use objects::{Asteroid, BULLET_LIFETIME_MS, Bullet, EXPLOSION_TIMESPAN_MS, Explosion};
pub use player::{DEFAULT_PLAYER_NAME, MAX_NAME_LEN, Player};
pub use ship::{
    BulletSpawn, DESTROY_TIME_MS, FireCadence, FireMode, SHIP_MASS, SHIP_RADIUS, Ship,
    ShipConfig, ShipType,
};
pub use special::{
    Action, DEFAULT_SPECIAL_POWER, Hook, Special, SpecialEvent, SpecialKind, SpecialState,
    impact_energy,
};
pub use timer::{Countdown, tick_slot};

use crate::mirror::Smoothing;
use crate::replication::{Field, Layout, PropertyOptions, Shadow, ValueError, WireValue};

#[derive(Debug, Clone, PartialEq)]
pub enum EntityData {
    Player(Player),
    WorldBounds(WorldBounds),
    Ship(Ship),
    Bullet(Bullet),
    Asteroid(Asteroid),
    Explosion(Explosion),
    Starfield(Starfield),
    Planet(Planet),
}

impl EntityData {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityData::Player(_) => EntityKind::Player,
            EntityData::WorldBounds(_) => EntityKind::WorldBounds,
            EntityData::Ship(_) => EntityKind::Ship,
            EntityData::Bullet(_) => EntityKind::Bullet,
            EntityData::Asteroid(_) => EntityKind::Asteroid,
            EntityData::Explosion(_) => EntityKind::Explosion,
            EntityData::Starfield(_) => EntityKind::Starfield,
            EntityData::Planet(_) => EntityKind::Planet,
        }
    }

    /// Default-constructed state for a mirror about to receive its first
    /// full object. Kinds with an owner need it up front.
    pub fn blank(kind: EntityKind, owner: Option<EntityId>) -> Option<Self> {
        let data = match kind {
            EntityKind::Player => EntityData::Player(Player::default()),
            EntityKind::WorldBounds => EntityData::WorldBounds(WorldBounds::default()),
            EntityKind::Ship => EntityData::Ship(Ship::new(owner?, &ShipConfig::default())),
            EntityKind::Bullet => {
                EntityData::Bullet(Bullet::new(owner?, "#fff", glam::Vec2::ZERO, glam::Vec2::ZERO))
            }
            EntityKind::Asteroid => EntityData::Asteroid(Asteroid::default()),
            EntityKind::Explosion => EntityData::Explosion(Explosion::default()),
            EntityKind::Starfield => EntityData::Starfield(Starfield::default()),
            EntityKind::Planet => EntityData::Planet(Planet::default()),
        };
        Some(data)
    }
}

static PLAYER_LAYOUT: LazyLock<Layout> =
    LazyLock::new(|| Layout::builder(EntityKind::Player).register(Field::Name).build());

static BOUNDS_LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
    Layout::builder(EntityKind::WorldBounds)
        .register(Field::Position)
        .register(Field::Size)
        .build()
});

static SHIP_LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
    Layout::builder(EntityKind::Ship)
        .collidable()
        .register_with(Field::Owner, PropertyOptions::mandatory())
        .register(Field::Color)
        .register(Field::ShipType)
        // shield status moves every tick; only meaningful steps are sent
        .register_with(Field::Special, PropertyOptions::within(0.5))
        .register(Field::Thrust)
        .register(Field::Rotate)
        .register(Field::Firing)
        .register(Field::Destroying)
        .register(Field::BulletSpeed)
        .register(Field::MaxThrust)
        .register(Field::MaxRotate)
        .register(Field::FireMode)
        .build()
});

static BULLET_LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
    Layout::builder(EntityKind::Bullet)
        .collidable()
        .register_with(Field::Owner, PropertyOptions::mandatory())
        .register(Field::Color)
        .build()
});

static ASTEROID_LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
    Layout::builder(EntityKind::Asteroid)
        .collidable()
        .register(Field::Color)
        .build()
});

static EXPLOSION_LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
    Layout::builder(EntityKind::Explosion)
        .body()
        .register(Field::Color)
        .register(Field::ExplosionType)
        .register(Field::Timespan)
        .build()
});

static STARFIELD_LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
    Layout::builder(EntityKind::Starfield)
        .register(Field::Position)
        .register(Field::Size)
        .register(Field::Depth)
        .register(Field::Density)
        .register(Field::Repeat)
        .register(Field::StarfieldType)
        .register(Field::Rotation)
        .register(Field::Seed)
        .build()
});

static PLANET_LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
    Layout::builder(EntityKind::Planet)
        .register(Field::Position)
        .register(Field::Size)
        .register(Field::Depth)
        .register(Field::PlanetType)
        .build()
});

/// The shared property layout of a kind.
pub fn layout_of(kind: EntityKind) -> &'static Layout {
    match kind {
        EntityKind::Player => &PLAYER_LAYOUT,
        EntityKind::WorldBounds => &BOUNDS_LAYOUT,
        EntityKind::Ship => &SHIP_LAYOUT,
        EntityKind::Bullet => &BULLET_LAYOUT,
        EntityKind::Asteroid => &ASTEROID_LAYOUT,
        EntityKind::Explosion => &EXPLOSION_LAYOUT,
        EntityKind::Starfield => &STARFIELD_LAYOUT,
        EntityKind::Planet => &PLANET_LAYOUT,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    id: EntityId,
    parent: Option<EntityId>,
    pub data: EntityData,
    shadow: Shadow,
    /// Present on mirrors that have received at least one update.
    pub smoothing: Option<Smoothing>,
}

impl Entity {
    pub fn new(id: EntityId, data: EntityData) -> Self {
        Self {
            id,
            parent: None,
            data,
            shadow: Shadow::default(),
            smoothing: None,
        }
    }

    pub fn with_parent(mut self, parent: EntityId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<EntityId>) {
        self.parent = parent;
    }

    pub fn kind(&self) -> EntityKind {
        self.data.kind()
    }

    pub fn tags(&self) -> Tags {
        self.kind().tags()
    }

    pub fn has_tag(&self, tag: Tags) -> bool {
        self.tags().contains(tag)
    }

    pub fn layout(&self) -> &'static Layout {
        layout_of(self.kind())
    }

    pub fn shadow(&self) -> &Shadow {
        &self.shadow
    }

    pub fn shadow_mut(&mut self) -> &mut Shadow {
        &mut self.shadow
    }

    pub fn body(&self) -> Option<&Body> {
        match &self.data {
            EntityData::Ship(s) => Some(&s.body),
            EntityData::Bullet(b) => Some(&b.body),
            EntityData::Asteroid(a) => Some(&a.body),
            EntityData::Explosion(e) => Some(&e.body),
            _ => None,
        }
    }

    pub fn body_mut(&mut self) -> Option<&mut Body> {
        match &mut self.data {
            EntityData::Ship(s) => Some(&mut s.body),
            EntityData::Bullet(b) => Some(&mut b.body),
            EntityData::Asteroid(a) => Some(&mut a.body),
            EntityData::Explosion(e) => Some(&mut e.body),
            _ => None,
        }
    }

    /// Position for drawing, including background layers.
    pub fn position(&self) -> Option<glam::Vec2> {
        match &self.data {
            EntityData::WorldBounds(b) => Some(b.position),
            EntityData::Starfield(s) => Some(s.position),
            EntityData::Planet(p) => Some(p.position),
            _ => self.body().map(|b| b.position),
        }
    }

    pub fn owner(&self) -> Option<EntityId> {
        match &self.data {
            EntityData::Ship(s) => Some(s.owner),
            EntityData::Bullet(b) => Some(b.owner),
            _ => None,
        }
    }

    pub fn as_ship(&self) -> Option<&Ship> {
        match &self.data {
            EntityData::Ship(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_ship_mut(&mut self) -> Option<&mut Ship> {
        match &mut self.data {
            EntityData::Ship(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_player(&self) -> Option<&Player> {
        match &self.data {
            EntityData::Player(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut Player> {
        match &mut self.data {
            EntityData::Player(p) => Some(p),
            _ => None,
        }
    }

    /// True while the entity is tearing itself down and must not take part
    /// in new contacts.
    pub fn is_destroying(&self) -> bool {
        self.as_ship().is_some_and(|s| s.destroying)
    }

    pub fn read(&self, field: Field) -> Option<WireValue> {
        match &self.data {
            EntityData::Player(p) => p.read(field),
            EntityData::WorldBounds(b) => b.read(field),
            EntityData::Ship(s) => s.read(field),
            EntityData::Bullet(b) => b.read(field),
            EntityData::Asteroid(a) => a.read(field),
            EntityData::Explosion(e) => e.read(field),
            EntityData::Starfield(s) => s.read(field),
            EntityData::Planet(p) => p.read(field),
        }
    }

    pub fn write(&mut self, field: Field, value: &WireValue, initial: bool) -> Result<(), ValueError> {
        match &mut self.data {
            EntityData::Player(p) => p.write(field, value),
            EntityData::WorldBounds(b) => b.write(field, value),
            EntityData::Ship(s) => s.write(field, value),
            EntityData::Bullet(b) => b.write(field, value),
            EntityData::Asteroid(a) => a.write(field, value),
            EntityData::Explosion(e) => e.write(field, value, initial),
            EntityData::Starfield(s) => s.write(field, value),
            EntityData::Planet(p) => p.write(field, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_layout_field_is_readable() {
        let owner = Some(EntityId(1));
        for kind in EntityKind::ALL {
            let data = EntityData::blank(kind, owner).unwrap();
            let entity = Entity::new(EntityId(9), data);
            assert_eq!(entity.kind(), kind);
            for property in entity.layout().properties() {
                assert!(
                    entity.read(property.field).is_some(),
                    "{:?} cannot read {:?}",
                    kind,
                    property.field
                );
            }
        }
    }

    #[test]
    fn owned_kinds_need_owner() {
        assert!(EntityData::blank(EntityKind::Bullet, None).is_none());
        assert!(EntityData::blank(EntityKind::Asteroid, None).is_some());
    }

    #[test]
    fn ship_layout_marks_owner_mandatory() {
        let layout = layout_of(EntityKind::Ship);
        assert!(!layout.is_optional("owner"));
        assert!(layout.is_optional("position"));
        assert!(layout.by_wire_name("totalForce").is_none());
    }
}
