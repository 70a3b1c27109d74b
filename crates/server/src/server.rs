use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::debug;

use arena::{
    Authority, AuthorityEvent, DisconnectReason, EntityId, FixedTimestep, NetworkEndpoint,
    NetworkStats, Outbound, Packet, PacketType, PeerId, PeerTable, ServerMessage, Target,
};

use crate::config::ServerConfig;
use crate::events::ServerEvent;

pub struct GameServer {
    endpoint: NetworkEndpoint,
    peers: PeerTable,
    authority: Authority,
    timestep: FixedTimestep,
    last_tick_time: Instant,
    start_time: Instant,
    running: Arc<AtomicBool>,
    pending_events: VecDeque<ServerEvent>,
}

impl GameServer {
    pub fn new(config: ServerConfig) -> Result<Self> {
        let endpoint = NetworkEndpoint::bind(config.bind.as_str())
            .with_context(|| format!("cannot bind {}", config.bind))?;
        let timestep = FixedTimestep::new(config.authority.tick_rate);
        let authority = Authority::new(config.authority).context("cannot populate the world")?;

        let mut pending_events = VecDeque::new();
        pending_events.push_back(ServerEvent::Listening {
            addr: endpoint.local_addr(),
        });

        Ok(Self {
            endpoint,
            peers: PeerTable::new(),
            authority,
            timestep,
            last_tick_time: Instant::now(),
            start_time: Instant::now(),
            running: Arc::new(AtomicBool::new(true)),
            pending_events,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ServerEvent> + '_ {
        self.pending_events.drain(..)
    }

    pub fn run(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            self.tick_once();
            for event in self.pending_events.drain(..) {
                if event.is_problem() {
                    log::warn!("{}", event.describe());
                } else {
                    log::info!("{}", event.describe());
                }
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        self.shutdown_connections();
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.start_time.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    pub fn shutdown_connections(&mut self) {
        for peer in self.authority.peer_ids() {
            self.drop_peer(peer, DisconnectReason::Kicked);
        }
        self.collect_events();
    }

    /// Tells the peer it is gone and tears its session down.
    fn drop_peer(&mut self, peer: PeerId, reason: DisconnectReason) {
        self.farewell(peer);
        self.authority.disconnect(peer, reason);
    }

    /// Sends the peer a disconnect and forgets its address.
    fn farewell(&mut self, peer: PeerId) {
        if let Some(addr) = self.peers.remove(peer) {
            if let Err(e) = self.endpoint.send_to(PacketType::Disconnect, addr) {
                self.report_error(format!("Failed to send disconnect to {}: {}", addr, e));
            }
            self.endpoint.forget(&addr);
        }
    }

    pub fn tick_once(&mut self) {
        let now = Instant::now();
        let delta = now - self.last_tick_time;
        self.last_tick_time = now;
        self.timestep.accumulate(delta.as_secs_f32());

        if let Err(e) = self.process_network() {
            self.report_error(format!("Network error: {}", e));
        }

        while self.timestep.consume_tick() {
            self.tick();
        }
    }

    fn tick(&mut self) {
        let now_ms = self.now_ms();
        let outbound = self.authority.tick(self.timestep.dt(), now_ms);
        for Outbound { target, batch } in outbound {
            let recipients: Vec<SocketAddr> = match target {
                Target::All => self
                    .authority
                    .peer_ids()
                    .into_iter()
                    .filter_map(|peer| self.peers.addr_of(peer))
                    .collect(),
                Target::Peer(peer) => self.peers.addr_of(peer).into_iter().collect(),
            };
            let payload = PacketType::Server(ServerMessage::Snapshot(batch));
            for addr in recipients {
                self.send(payload.clone(), addr);
            }
        }
        self.collect_events();
    }

    fn send(&mut self, payload: PacketType, addr: SocketAddr) {
        if let Err(e) = self.endpoint.send_to(payload, addr) {
            self.report_error(format!("Failed to send to {}: {}", addr, e));
        }
    }

    fn process_network(&mut self) -> io::Result<()> {
        let packets = self.endpoint.receive()?;
        for (packet, addr) in packets {
            self.handle_packet(packet, addr);
        }
        Ok(())
    }

    fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet.payload {
            PacketType::Client(message) => {
                let (peer, _) = self.peers.get_or_insert(addr);
                let replies = self.authority.handle(peer, message, self.now_ms());
                for reply in replies {
                    self.send(PacketType::Server(reply), addr);
                }
                // refused before introduce: nothing to keep for this address
                if !self.authority.has_peer(peer) {
                    self.peers.remove(peer);
                    self.endpoint.forget(&addr);
                }
            }
            PacketType::Disconnect => {
                if let Some(peer) = self.peers.id_of(&addr) {
                    self.peers.remove(peer);
                    self.endpoint.forget(&addr);
                    self.authority.disconnect(peer, DisconnectReason::Graceful);
                }
            }
            PacketType::Server(message) => {
                debug!("ignoring server message from {}: {:?}", addr, message);
            }
        }
        self.collect_events();
    }

    fn collect_events(&mut self) {
        for event in self.authority.drain_events() {
            let addr = match &event {
                AuthorityEvent::PeerJoined { peer, .. } => self.peers.addr_of(*peer),
                // the authority already tore the session down
                AuthorityEvent::PeerLeft {
                    peer,
                    reason: DisconnectReason::Timeout,
                    ..
                } => {
                    self.farewell(*peer);
                    None
                }
                _ => None,
            };
            self.pending_events
                .push_back(ServerEvent::from_authority(event, addr));
        }
    }

    fn report_error(&mut self, message: String) {
        self.pending_events.push_back(ServerEvent::Error { message });
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            tick: self.authority.ticks(),
            peer_count: self.authority.peer_count(),
            max_peers: self.authority.config().max_peers,
            entity_count: self.authority.world().len(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            network_stats: *self.endpoint.stats(),
        }
    }

    pub fn peer_infos(&self) -> Vec<PeerInfo> {
        self.authority
            .peer_ids()
            .into_iter()
            .filter_map(|id| {
                let peer = self.authority.peer(id)?;
                let name = self
                    .authority
                    .world()
                    .get(peer.player)
                    .and_then(|e| e.as_player())
                    .map(|p| p.name.clone())
                    .unwrap_or_default();
                Some(PeerInfo {
                    peer: id,
                    addr: self.peers.addr_of(id),
                    player: peer.player,
                    name,
                    ship: peer.ship,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ServerStats {
    pub tick: u64,
    pub peer_count: usize,
    pub max_peers: usize,
    pub entity_count: usize,
    pub uptime_secs: u64,
    pub network_stats: NetworkStats,
}

#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub peer: PeerId,
    pub addr: Option<SocketAddr>,
    pub player: EntityId,
    pub name: String,
    pub ship: Option<EntityId>,
}
