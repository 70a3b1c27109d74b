pub mod authority;
pub mod clock;
pub mod entity;
pub mod mirror;
pub mod net;
pub mod physics;
pub mod replication;
pub mod simulation;
pub mod world;

pub use authority::{
    ActionError, Authority, AuthorityConfig, AuthorityEvent, BroadcastConfig, BroadcastScheduler,
    DisconnectReason, Outbound, Target,
};
pub use clock::{ClockConfig, ClockEstimator};
pub use entity::{Entity, EntityData, EntityId, EntityKind, ShipConfig, Tags};
pub use mirror::{ClientSession, MirrorConfig, ReconcileReport, Reconciler, SmoothingConfig};
pub use net::{
    ClientMessage, DEFAULT_PORT, DEFAULT_TICK_RATE, NetworkEndpoint, NetworkStats, Packet,
    PacketError, PacketHeader, PacketType, PeerId, PeerTable, ServerMessage,
};
pub use physics::{CollisionReport, CollisionSystem};
pub use replication::{DecodeError, SnapshotBatch, UpdateKind, WireObject, WireValue};
pub use simulation::{AsteroidField, FixedTimestep, Simulation, StepReport};
pub use world::{Role, World, WorldError, WorldEvent};
