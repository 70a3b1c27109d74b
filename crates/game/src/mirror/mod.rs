mod reconcile;
mod smoothing;

use std::collections::VecDeque;

use log::{debug, info, warn};

pub use reconcile::{ReconcileReport, Reconciler};
pub use smoothing::{Smoothing, SmoothingConfig, apply_smoothing};

use crate::clock::{ClockConfig, ClockEstimator};
use crate::entity::{Entity, EntityId, Ship, Tags};
use crate::net::{ClientMessage, ServerMessage};
use crate::replication::DecodeError;
use crate::simulation::Simulation;
use crate::world::{Role, World, WorldEvent};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorConfig {
    pub clock: ClockConfig,
    pub smoothing: SmoothingConfig,
    /// Minimum spacing between two resync requests.
    pub resync_cooldown_ms: u64,
    pub seed: u64,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            clock: ClockConfig::default(),
            smoothing: SmoothingConfig::default(),
            resync_cooldown_ms: 2_000,
            seed: 0,
        }
    }
}

type RemovalObserver = Box<dyn FnMut(&Entity) + Send>;

/// The peer side: a mirror world kept in line with the authority, with local
/// prediction and smoothing in between batches.
pub struct ClientSession {
    config: MirrorConfig,
    world: World,
    simulation: Simulation,
    reconciler: Reconciler,
    clock: ClockEstimator,
    player: Option<EntityId>,
    connected: bool,
    outbox: VecDeque<ClientMessage>,
    on_removed: Option<RemovalObserver>,
    gap_seen: bool,
    last_resync_ms: Option<u64>,
}

impl ClientSession {
    pub fn new(config: MirrorConfig) -> Self {
        Self {
            world: World::new(Role::Mirror, config.seed),
            simulation: Simulation::new(),
            reconciler: Reconciler::new(),
            clock: ClockEstimator::new(config.clock),
            config,
            player: None,
            connected: false,
            outbox: VecDeque::new(),
            on_removed: None,
            gap_seen: false,
            last_resync_ms: None,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn clock(&self) -> &ClockEstimator {
        &self.clock
    }

    /// Our player, once the authority welcomed us.
    pub fn player(&self) -> Option<EntityId> {
        self.player
    }

    /// False before `connect` and after the session was torn down, locally
    /// or because the authority no longer knows us.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn own_ship(&self) -> Option<&Entity> {
        let player = self.player?;
        self.world
            .find_all_with_tag(Tags::SHIP)
            .find(|e| e.owner() == Some(player))
    }

    pub fn own_ship_state(&self) -> Option<&Ship> {
        self.own_ship().and_then(Entity::as_ship)
    }

    /// Called once for every mirror that leaves the world, whatever removed it.
    pub fn set_removal_observer(&mut self, observer: impl FnMut(&Entity) + Send + 'static) {
        self.on_removed = Some(Box::new(observer));
    }

    pub fn connect(&mut self, now_ms: u64) {
        self.connected = true;
        self.outbox.push_back(ClientMessage::Introduce);
        if let Some(timestamp) = self.clock.poll(now_ms) {
            self.outbox.push_back(ClientMessage::Echo { timestamp });
        }
    }

    pub fn send(&mut self, message: ClientMessage) {
        self.outbox.push_back(message);
    }

    pub fn drain_outbox(&mut self) -> Vec<ClientMessage> {
        self.outbox.drain(..).collect()
    }

    /// Takes in one authority message. Snapshots wait for the next tick.
    pub fn receive(&mut self, message: ServerMessage, now_ms: u64) {
        match message {
            ServerMessage::Welcome { player } => {
                info!("welcomed as player {}", player);
                self.player = Some(player);
            }
            ServerMessage::EchoReply { timestamp } => {
                self.clock.observe(timestamp, now_ms);
            }
            ServerMessage::Snapshot(batch) => self.reconciler.enqueue(batch),
            ServerMessage::ErrorNotice { message, rejoin } => {
                warn!("server: {}", message);
                // before the welcome these are leftovers from the last session
                if rejoin && self.player.is_some() {
                    info!("authority dropped our session");
                    self.teardown();
                }
            }
        }
    }

    pub fn tick(&mut self, dt: f32, now_ms: u64) -> Result<ReconcileReport, DecodeError> {
        if self.connected {
            if let Some(timestamp) = self.clock.poll(now_ms) {
                if self.player.is_none() {
                    debug!("no welcome yet, introducing again");
                    self.outbox.push_back(ClientMessage::Introduce);
                }
                self.outbox.push_back(ClientMessage::Echo { timestamp });
            }
        }

        let report = self
            .reconciler
            .apply_pending(&mut self.world, self.clock.drift(), now_ms)?;

        let step = self.simulation.step(&mut self.world, dt);
        for &id in &step.removed {
            self.reconciler.retire(id);
        }
        apply_smoothing(&mut self.world, &self.config.smoothing, dt, now_ms);

        self.gap_seen |= report.has_gaps();
        let cooled = self
            .last_resync_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.config.resync_cooldown_ms);
        if self.gap_seen && cooled && self.connected {
            debug!("mirror has gaps, asking for a resync");
            self.outbox.push_back(ClientMessage::Resync);
            self.last_resync_ms = Some(now_ms);
            self.gap_seen = false;
        }

        self.notify_removals();
        Ok(report)
    }

    /// Drops every mirror, firing the observer for each. A later `connect`
    /// starts from an empty world.
    pub fn teardown(&mut self) {
        for id in self.world.ids() {
            self.world.remove(id);
        }
        self.player = None;
        self.connected = false;
        self.reconciler = Reconciler::new();
        self.outbox.clear();
        self.gap_seen = false;
        self.last_resync_ms = None;
        self.notify_removals();
    }

    fn notify_removals(&mut self) {
        for event in self.world.drain_events() {
            if let (WorldEvent::Removed(entity), Some(observer)) = (&event, self.on_removed.as_mut()) {
                observer(entity);
            }
        }
    }
}
