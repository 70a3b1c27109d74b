mod peer;
mod scheduler;

use std::collections::{BTreeMap, VecDeque};

use glam::Vec2;
use log::{debug, info, warn};
use rand::Rng;

pub use peer::{Deadline, Peer};
pub use scheduler::{BroadcastConfig, BroadcastScheduler, Outbound, Target};

use crate::entity::{EntityData, EntityId, Hook, Player, Ship, ShipConfig, Tags, WorldBounds};
use crate::net::{ClientMessage, PeerId, ServerMessage};
use crate::replication::UpdateKind;
use crate::simulation::{AsteroidField, Simulation, StepReport, populate};
use crate::world::{Role, World, WorldError, WorldEvent};

#[derive(Debug, Clone, PartialEq)]
pub struct AuthorityConfig {
    pub tick_rate: u32,
    pub broadcast: BroadcastConfig,
    pub idle_timeout_ms: u64,
    pub connection_timeout_ms: u64,
    pub max_peers: usize,
    pub seed: u64,
    pub bounds: WorldBounds,
    pub asteroids: AsteroidField,
    pub background: bool,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            broadcast: BroadcastConfig::default(),
            idle_timeout_ms: 60_000,
            connection_timeout_ms: 10_000,
            max_peers: 32,
            seed: 0,
            bounds: WorldBounds::default(),
            asteroids: AsteroidField::default(),
            background: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Graceful,
    Timeout,
    Kicked,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Graceful => "disconnected",
            DisconnectReason::Timeout => "timed out",
            DisconnectReason::Kicked => "kicked",
        }
    }
}

/// A peer message the authority refused. Authoritative state is untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("{0} before introduce")]
    NotIntroduced(&'static str),
    #[error("player {0} is not yours")]
    Unauthorized(EntityId),
    #[error("server full")]
    ServerFull,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthorityEvent {
    PeerJoined {
        peer: PeerId,
        player: EntityId,
    },
    PeerLeft {
        peer: PeerId,
        player: EntityId,
        reason: DisconnectReason,
    },
    ShipSpawned {
        peer: PeerId,
        ship: EntityId,
    },
    ShipDestroyed {
        ship: EntityId,
    },
    Rejected {
        peer: PeerId,
        error: ActionError,
    },
}

/// The canonical game: owns the world, its peers and the broadcast schedule.
#[derive(Debug)]
pub struct Authority {
    config: AuthorityConfig,
    world: World,
    simulation: Simulation,
    scheduler: BroadcastScheduler,
    peers: BTreeMap<PeerId, Peer>,
    events: VecDeque<AuthorityEvent>,
    ticks: u64,
}

impl Authority {
    /// Creates and populates the world.
    pub fn new(config: AuthorityConfig) -> Result<Self, WorldError> {
        let mut world = World::new(Role::Authority, config.seed);
        populate(&mut world, config.bounds, &config.asteroids, config.background)?;
        // population is part of the join listing, not of the first broadcast
        world.drain_events();
        info!(
            "authority ready: {} entities, {} Hz, up to {} peers",
            world.len(),
            config.tick_rate,
            config.max_peers
        );
        Ok(Self {
            scheduler: BroadcastScheduler::new(config.broadcast),
            config,
            world,
            simulation: Simulation::new(),
            peers: BTreeMap::new(),
            events: VecDeque::new(),
            ticks: 0,
        })
    }

    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn peer(&self, id: PeerId) -> Option<&Peer> {
        self.peers.get(&id)
    }

    pub fn has_peer(&self, id: PeerId) -> bool {
        self.peers.contains_key(&id)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.peers.keys().copied().collect()
    }

    pub fn drain_events(&mut self) -> Vec<AuthorityEvent> {
        self.events.drain(..).collect()
    }

    /// Handles one inbound message and returns the direct replies to `peer`.
    pub fn handle(&mut self, peer: PeerId, message: ClientMessage, now_ms: u64) -> Vec<ServerMessage> {
        match self.dispatch(peer, message, now_ms) {
            Ok(replies) => replies,
            Err(error) => {
                debug!("{} rejected: {}", peer, error);
                let notice = ServerMessage::ErrorNotice {
                    message: error.to_string(),
                    rejoin: matches!(error, ActionError::NotIntroduced(_)),
                };
                self.events.push_back(AuthorityEvent::Rejected { peer, error });
                vec![notice]
            }
        }
    }

    fn dispatch(
        &mut self,
        id: PeerId,
        message: ClientMessage,
        now_ms: u64,
    ) -> Result<Vec<ServerMessage>, ActionError> {
        let Some(peer) = self.peers.get_mut(&id) else {
            return match message {
                ClientMessage::Introduce => self.introduce(id, now_ms),
                other => Err(ActionError::NotIntroduced(other.name())),
            };
        };
        peer.touch(now_ms);
        let (player, ship) = (peer.player, peer.ship);

        match message {
            ClientMessage::Introduce => {
                self.scheduler.introduce(id);
                Ok(vec![ServerMessage::Welcome { player }])
            }
            ClientMessage::Echo { timestamp } => {
                peer.echoed(now_ms);
                Ok(vec![ServerMessage::EchoReply { timestamp }])
            }
            ClientMessage::UpdatePlayer { id: target, name } => {
                if target != player {
                    return Err(ActionError::Unauthorized(target));
                }
                let renamed = self
                    .world
                    .get_mut(player)
                    .and_then(|e| e.as_player_mut())
                    .is_some_and(|p| p.rename(&name));
                if renamed {
                    self.world.request_update(player, UpdateKind::Default);
                }
                Ok(Vec::new())
            }
            ClientMessage::SpawnShip(config) => {
                self.spawn_ship(id, player, ship, &config);
                Ok(Vec::new())
            }
            ClientMessage::Resync => {
                debug!("{} asked for a resync", id);
                self.scheduler.introduce(id);
                Ok(Vec::new())
            }
            action => {
                self.steer(id, ship, &action);
                Ok(Vec::new())
            }
        }
    }

    fn introduce(&mut self, id: PeerId, now_ms: u64) -> Result<Vec<ServerMessage>, ActionError> {
        if self.peers.len() >= self.config.max_peers {
            return Err(ActionError::ServerFull);
        }
        let player = match self.world.spawn(EntityData::Player(Player::default())) {
            Ok(player) => player,
            Err(e) => {
                warn!("cannot create player for {}: {}", id, e);
                return Err(ActionError::ServerFull);
            }
        };
        let peer = Peer::new(
            id,
            player,
            self.config.idle_timeout_ms,
            self.config.connection_timeout_ms,
            now_ms,
        );
        self.peers.insert(id, peer);
        self.scheduler.introduce(id);
        info!("{} joined as player {}", id, player);
        self.events
            .push_back(AuthorityEvent::PeerJoined { peer: id, player });
        Ok(vec![ServerMessage::Welcome { player }])
    }

    fn spawn_ship(
        &mut self,
        id: PeerId,
        player: EntityId,
        previous: Option<EntityId>,
        config: &ShipConfig,
    ) {
        if let Some(previous) = previous {
            self.world.remove(previous);
        }
        let mut ship = Ship::new(player, &config.clone().sanitized());
        let bounds = self.world.bounds().unwrap_or(self.config.bounds);
        let (min, max) = bounds.inset(ship.body.radius);
        let rng = self.world.rng();
        ship.body.position = Vec2::new(sample(rng, min.x, max.x), sample(rng, min.y, max.y));
        ship.body.rotation = sample(rng, 0.0, std::f32::consts::TAU);

        match self.world.spawn_child(player, EntityData::Ship(ship)) {
            Ok(ship) => {
                if let Some(peer) = self.peers.get_mut(&id) {
                    peer.ship = Some(ship);
                }
                info!("{} spawned ship {}", id, ship);
                self.events
                    .push_back(AuthorityEvent::ShipSpawned { peer: id, ship });
            }
            Err(e) => warn!("cannot spawn ship for {}: {}", id, e),
        }
    }

    fn steer(&mut self, id: PeerId, ship: Option<EntityId>, action: &ClientMessage) {
        let Some(ship_id) = ship else {
            debug!("{}: {} without a ship", id, action.name());
            return;
        };
        let Some(ship) = self.world.get_mut(ship_id).and_then(|e| e.as_ship_mut()) else {
            debug!("{}: {} for a ship that is gone", id, action.name());
            return;
        };
        let hook = match *action {
            ClientMessage::RotateCw(on) => ship.rotate_cw(on),
            ClientMessage::RotateCcw(on) => ship.rotate_ccw(on),
            ClientMessage::Thrust(on) => ship.thrust(on),
            ClientMessage::Fire(on) => ship.fire(on),
            ClientMessage::Special(on) => ship.special(on),
            _ => return,
        };
        match hook {
            Hook::Allow => self.world.request_update(ship_id, UpdateKind::Default),
            Hook::Cancel => debug!("{}: {} vetoed on ship {}", id, action.name(), ship_id),
        }
    }

    /// Tears a peer down: its player goes, and with it the ship.
    pub fn disconnect(&mut self, id: PeerId, reason: DisconnectReason) -> bool {
        let Some(peer) = self.peers.remove(&id) else {
            return false;
        };
        self.world.remove(peer.player);
        self.scheduler.forget(id);
        info!("{} {}", id, reason.as_str());
        self.events.push_back(AuthorityEvent::PeerLeft {
            peer: id,
            player: peer.player,
            reason,
        });
        true
    }

    /// Advances the game by `dt` seconds and returns what to broadcast.
    pub fn tick(&mut self, dt: f32, now_ms: u64) -> Vec<Outbound> {
        let expired: Vec<PeerId> = self
            .peers
            .values()
            .filter(|p| p.is_expired(now_ms))
            .map(|p| p.id)
            .collect();
        for id in expired {
            self.disconnect(id, DisconnectReason::Timeout);
        }

        let report = self.simulation.step(&mut self.world, dt);
        self.record(&report);
        self.schedule_world_events();
        self.ticks += 1;

        self.scheduler.flush(&mut self.world, now_ms, now_ms)
    }

    fn record(&mut self, report: &StepReport) {
        for &ship in &report.collisions.destroyed_ships {
            info!("ship {} destroyed", ship);
            self.events.push_back(AuthorityEvent::ShipDestroyed { ship });
        }
    }

    fn schedule_world_events(&mut self) {
        for event in self.world.drain_events() {
            match event {
                WorldEvent::Added { id, kind } => {
                    if kind.tags().contains(Tags::NETWORK) {
                        self.scheduler.request(id, kind, UpdateKind::Full);
                    }
                }
                WorldEvent::Removed(entity) => {
                    let id = entity.id();
                    for peer in self.peers.values_mut() {
                        if peer.ship == Some(id) {
                            peer.ship = None;
                        }
                    }
                    if entity.has_tag(Tags::NETWORK) {
                        self.scheduler.request(id, entity.kind(), UpdateKind::Delete);
                    }
                }
                WorldEvent::Changed { id, update } => {
                    if let Some(entity) = self.world.get(id) {
                        self.scheduler.request(id, entity.kind(), update);
                    }
                }
            }
        }
    }
}

fn sample<R: Rng>(rng: &mut R, min: f32, max: f32) -> f32 {
    if max > min { rng.random_range(min..max) } else { min }
}
