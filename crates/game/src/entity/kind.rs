use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Tags: u16 {
        /// Replicated to peers: full on join and on creation, delete on removal.
        const NETWORK = 1 << 0;
        /// Swept by the periodic delta broadcast.
        const STEADY = 1 << 1;
        /// Carries a body and feels gravity wells.
        const GAMEBASE = 1 << 2;
        const COLLIDABLE = 1 << 3;
        const PLAYER = 1 << 4;
        const WORLD = 1 << 5;
        const SHIP = 1 << 6;
        const BULLET = 1 << 7;
        const ASTEROID = 1 << 8;
        const EXPLOSION = 1 << 9;
        const BACKGROUND = 1 << 10;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    WorldBounds,
    Ship,
    Bullet,
    Asteroid,
    Explosion,
    Starfield,
    Planet,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Player,
        EntityKind::WorldBounds,
        EntityKind::Ship,
        EntityKind::Bullet,
        EntityKind::Asteroid,
        EntityKind::Explosion,
        EntityKind::Starfield,
        EntityKind::Planet,
    ];

    pub fn wire_name(self) -> &'static str {
        match self {
            EntityKind::Player => "Player",
            EntityKind::WorldBounds => "WorldBounds",
            EntityKind::Ship => "Ship",
            EntityKind::Bullet => "Bullet",
            EntityKind::Asteroid => "Asteroid",
            EntityKind::Explosion => "Explosion",
            EntityKind::Starfield => "Starfield",
            EntityKind::Planet => "Planet",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.wire_name() == name)
    }

    /// The kind an instance must reference through its `owner` field before a
    /// mirror of it can be created.
    pub fn owner_kind(self) -> Option<EntityKind> {
        match self {
            EntityKind::Ship => Some(EntityKind::Player),
            EntityKind::Bullet => Some(EntityKind::Ship),
            _ => None,
        }
    }

    pub fn tags(self) -> Tags {
        let body = Tags::NETWORK | Tags::GAMEBASE;
        match self {
            EntityKind::Player => Tags::NETWORK | Tags::STEADY | Tags::PLAYER,
            EntityKind::WorldBounds => Tags::NETWORK | Tags::WORLD,
            EntityKind::Ship => body | Tags::STEADY | Tags::COLLIDABLE | Tags::SHIP,
            EntityKind::Bullet => body | Tags::STEADY | Tags::COLLIDABLE | Tags::BULLET,
            EntityKind::Asteroid => body | Tags::STEADY | Tags::COLLIDABLE | Tags::ASTEROID,
            EntityKind::Explosion => body | Tags::EXPLOSION,
            EntityKind::Starfield | EntityKind::Planet => Tags::NETWORK | Tags::BACKGROUND,
        }
    }

    /// Ordering used when a whole world is listed in one batch, so owners are
    /// always listed ahead of the objects that reference them.
    pub fn listing_rank(self) -> u8 {
        match self {
            EntityKind::WorldBounds | EntityKind::Starfield | EntityKind::Planet => 0,
            EntityKind::Player => 1,
            EntityKind::Ship => 2,
            _ => 3,
        }
    }
}
