use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use arena::{
    ClientMessage, ClientSession, EntityId, FixedTimestep, NetworkEndpoint, Packet, PacketType,
    ServerMessage,
};

use crate::config::{ClientConfig, Controls, Rotate};

/// The messages that put `controls` into effect on a fresh ship.
pub fn control_messages(controls: &Controls) -> Vec<ClientMessage> {
    let mut messages = Vec::new();
    if controls.thrust {
        messages.push(ClientMessage::Thrust(true));
    }
    match controls.rotate {
        Some(Rotate::Cw) => messages.push(ClientMessage::RotateCw(true)),
        Some(Rotate::Ccw) => messages.push(ClientMessage::RotateCcw(true)),
        None => {}
    }
    if controls.fire {
        messages.push(ClientMessage::Fire(true));
    }
    messages
}

pub struct GameClient {
    endpoint: NetworkEndpoint,
    session: ClientSession,
    config: ClientConfig,
    timestep: FixedTimestep,
    start_time: Instant,
    last_frame: Instant,
    last_summary: Instant,
    running: Arc<AtomicBool>,
    removed: Arc<AtomicUsize>,
    welcomed: Option<EntityId>,
    ship_seen: bool,
    spawn_sent: Option<Instant>,
    lost_at: Option<Instant>,
}

impl GameClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut endpoint = NetworkEndpoint::bind("0.0.0.0:0").context("cannot bind a local socket")?;
        endpoint.set_remote(config.server);

        let mut session = ClientSession::new(config.mirror);
        let removed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&removed);
        session.set_removal_observer(move |entity| {
            debug!("mirror {} {} removed", entity.kind().wire_name(), entity.id());
            counter.fetch_add(1, Ordering::Relaxed);
        });

        Ok(Self {
            endpoint,
            session,
            timestep: FixedTimestep::new(config.tick_rate),
            config,
            start_time: Instant::now(),
            last_frame: Instant::now(),
            last_summary: Instant::now(),
            running: Arc::new(AtomicBool::new(true)),
            removed,
            welcomed: None,
            ship_seen: false,
            spawn_sent: None,
            lost_at: None,
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.config.server
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.start_time.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Plays until the duration runs out, the server says goodbye, or a
    /// batch cannot be decoded. Always says goodbye itself.
    pub fn run(&mut self) -> Result<()> {
        self.connect();
        let outcome = self.play();

        if let Err(e) = self.endpoint.send(PacketType::Disconnect) {
            warn!("failed to send disconnect: {}", e);
        }
        self.session.teardown();
        info!(
            "left {} after {:.1}s, {} mirrors removed",
            self.config.server,
            self.start_time.elapsed().as_secs_f32(),
            self.removed.load(Ordering::Relaxed)
        );
        outcome
    }

    fn play(&mut self) -> Result<()> {
        while self.running.load(Ordering::SeqCst) {
            if self
                .config
                .duration
                .is_some_and(|limit| self.start_time.elapsed() >= limit)
            {
                break;
            }
            self.tick_once()?;
            std::thread::sleep(Duration::from_millis(1));
        }
        Ok(())
    }

    pub fn tick_once(&mut self) -> Result<()> {
        let now = Instant::now();
        let delta = now - self.last_frame;
        self.last_frame = now;
        self.timestep.accumulate(delta.as_secs_f32());

        for (packet, addr) in self.endpoint.receive()? {
            self.handle_packet(packet, addr);
        }
        if self.welcomed.is_some() && !self.session.is_connected() {
            self.session_lost();
        }
        if let Some(lost_at) = self.lost_at {
            if self.config.reconnect.is_some_and(|delay| lost_at.elapsed() >= delay) {
                info!("reconnecting to {}", self.config.server);
                self.connect();
            }
        }

        while self.timestep.consume_tick() {
            let report = self
                .session
                .tick(self.timestep.dt(), self.now_ms())
                .context("mirror out of step with the server")?;
            if report.has_gaps() {
                debug!("batch gaps: {:?}", report);
            }
            self.check_ship();
        }

        for message in self.session.drain_outbox() {
            self.endpoint.send(PacketType::Client(message))?;
        }

        if self.last_summary.elapsed() >= self.config.summary_interval {
            self.last_summary = Instant::now();
            info!("{}", self.summary());
        }
        Ok(())
    }

    fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        if addr != self.config.server {
            debug!("ignoring packet from {}", addr);
            return;
        }
        match packet.payload {
            PacketType::Server(message) => {
                if let ServerMessage::Welcome { player } = &message {
                    if self.welcomed.is_none() {
                        self.welcomed = Some(*player);
                        self.session.send(ClientMessage::UpdatePlayer {
                            id: *player,
                            name: self.config.name.clone(),
                        });
                        self.spawn();
                    }
                }
                self.session.receive(message, self.now_ms());
            }
            PacketType::Disconnect => {
                info!("server closed the session");
                self.session.teardown();
                self.session_lost();
            }
            PacketType::Client(_) => debug!("ignoring client message from {}", addr),
        }
    }

    fn connect(&mut self) {
        self.welcomed = None;
        self.ship_seen = false;
        self.spawn_sent = None;
        self.lost_at = None;
        self.session.connect(self.now_ms());
    }

    fn session_lost(&mut self) {
        self.welcomed = None;
        self.spawn_sent = None;
        if self.config.reconnect.is_none() {
            self.running.store(false, Ordering::SeqCst);
        } else if self.lost_at.is_none() {
            self.lost_at = Some(Instant::now());
        }
    }

    fn spawn(&mut self) {
        self.session
            .send(ClientMessage::SpawnShip(self.config.ship.clone()));
        for message in control_messages(&self.config.controls) {
            self.session.send(message);
        }
        self.ship_seen = false;
        self.spawn_sent = Some(Instant::now());
    }

    /// Respawns once a ship we had is gone for good, or when a spawn request
    /// went unanswered.
    fn check_ship(&mut self) {
        match self.session.own_ship() {
            Some(_) => self.ship_seen = true,
            None if self.ship_seen => {
                info!("ship lost, respawning");
                self.spawn();
            }
            None => {
                let overdue = self
                    .spawn_sent
                    .is_some_and(|sent| sent.elapsed() >= self.config.spawn_retry);
                if overdue {
                    debug!("no ship yet, asking again");
                    self.spawn();
                }
            }
        }
    }

    fn summary(&self) -> String {
        let clock = self.session.clock();
        let rtt = clock
            .rtt()
            .map(|r| format!("{}ms", r))
            .unwrap_or_else(|| "?".into());
        let ship = match self.session.own_ship().and_then(|e| e.body()) {
            Some(body) => format!(
                "ship at ({:.0}, {:.0}) moving {:.0}",
                body.position.x,
                body.position.y,
                body.velocity.length()
            ),
            None => "no ship".into(),
        };
        if !self.session.is_connected() {
            return format!("tick {}  disconnected", self.timestep.ticks());
        }
        format!(
            "tick {}  mirrors {}  rtt {}  drift {}ms  {}",
            self.timestep.ticks(),
            self.session.world().len(),
            rtt,
            clock.drift(),
            ship
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_controls_become_messages() {
        let controls = Controls {
            thrust: true,
            fire: true,
            rotate: Some(Rotate::Ccw),
        };
        assert_eq!(
            control_messages(&controls),
            vec![
                ClientMessage::Thrust(true),
                ClientMessage::RotateCcw(true),
                ClientMessage::Fire(true),
            ]
        );
        assert!(control_messages(&Controls::default()).is_empty());
    }

    fn client_for(server: &NetworkEndpoint) -> GameClient {
        let mut config = ClientConfig::new(server.local_addr());
        config.reconnect = Some(Duration::ZERO);
        config.spawn_retry = Duration::from_millis(50);
        GameClient::new(config).unwrap()
    }

    /// Ticks the client for `ms` and returns what the server heard.
    fn pump(server: &mut NetworkEndpoint, client: &mut GameClient, ms: u64) -> Vec<PacketType> {
        let start = Instant::now();
        let mut heard = Vec::new();
        while start.elapsed() < Duration::from_millis(ms) {
            client.tick_once().unwrap();
            heard.extend(server.receive().unwrap().into_iter().map(|(p, _)| p.payload));
            std::thread::sleep(Duration::from_millis(1));
        }
        heard
    }

    fn introduces(heard: &[PacketType]) -> usize {
        heard
            .iter()
            .filter(|p| **p == PacketType::Client(ClientMessage::Introduce))
            .count()
    }

    fn spawns(heard: &[PacketType]) -> usize {
        heard
            .iter()
            .filter(|p| matches!(p, PacketType::Client(ClientMessage::SpawnShip(_))))
            .count()
    }

    #[test]
    fn goodbye_from_server_leads_to_a_new_introduce() {
        let mut server = NetworkEndpoint::bind("127.0.0.1:0").unwrap();
        let mut client = client_for(&server);
        let addr = SocketAddr::from(([127, 0, 0, 1], client.local_addr().port()));

        client.connect();
        assert_eq!(introduces(&pump(&mut server, &mut client, 50)), 1);

        let welcome = ServerMessage::Welcome { player: EntityId(5) };
        server.send_to(PacketType::Server(welcome), addr).unwrap();
        let heard = pump(&mut server, &mut client, 50);
        assert!(spawns(&heard) >= 1);
        assert!(client.is_connected());

        server.send_to(PacketType::Disconnect, addr).unwrap();
        let heard = pump(&mut server, &mut client, 50);
        assert_eq!(introduces(&heard), 1);
        assert!(client.is_connected());
        assert!(client.running.load(Ordering::SeqCst));
    }

    #[test]
    fn unknown_session_notice_leads_to_a_new_introduce() {
        let mut server = NetworkEndpoint::bind("127.0.0.1:0").unwrap();
        let mut client = client_for(&server);
        let addr = SocketAddr::from(([127, 0, 0, 1], client.local_addr().port()));
        client.connect();
        pump(&mut server, &mut client, 20);
        let welcome = ServerMessage::Welcome { player: EntityId(5) };
        server.send_to(PacketType::Server(welcome), addr).unwrap();
        pump(&mut server, &mut client, 20);

        let notice = ServerMessage::ErrorNotice {
            message: "echo before introduce".into(),
            rejoin: true,
        };
        server.send_to(PacketType::Server(notice), addr).unwrap();
        assert_eq!(introduces(&pump(&mut server, &mut client, 50)), 1);
    }

    #[test]
    fn unanswered_spawn_is_repeated() {
        let mut server = NetworkEndpoint::bind("127.0.0.1:0").unwrap();
        let mut client = client_for(&server);
        let addr = SocketAddr::from(([127, 0, 0, 1], client.local_addr().port()));
        client.connect();
        pump(&mut server, &mut client, 20);
        let welcome = ServerMessage::Welcome { player: EntityId(5) };
        server.send_to(PacketType::Server(welcome), addr).unwrap();
        assert!(spawns(&pump(&mut server, &mut client, 300)) >= 2);
    }
}
