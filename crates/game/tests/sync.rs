use arena::entity::{Asteroid, Bullet, SpecialKind};
use arena::{
    Authority, AuthorityConfig, AsteroidField, ClientMessage, ClientSession, CollisionSystem,
    DisconnectReason, EntityData, EntityId, EntityKind, MirrorConfig, Outbound, Packet,
    PacketHeader, PacketType, PeerId, Role, ServerMessage, ShipConfig, Simulation, Tags, Target,
    UpdateKind, World,
};
use glam::Vec2;

const DT: f32 = 1.0 / 60.0;
const DT_MS: u64 = 16;

struct Harness {
    authority: Authority,
    sessions: Vec<(PeerId, ClientSession)>,
    now: u64,
}

impl Harness {
    fn new(asteroids: AsteroidField) -> Self {
        let authority = Authority::new(AuthorityConfig {
            asteroids,
            background: false,
            seed: 7,
            ..Default::default()
        })
        .unwrap();
        Self {
            authority,
            sessions: Vec::new(),
            now: 0,
        }
    }

    fn join(&mut self, peer: u32) -> usize {
        let mut session = ClientSession::new(MirrorConfig {
            seed: u64::from(peer),
            ..Default::default()
        });
        session.connect(self.now);
        self.sessions.push((PeerId(peer), session));
        self.sessions.len() - 1
    }

    fn send(&mut self, index: usize, message: ClientMessage) {
        self.sessions[index].1.send(message);
    }

    fn deliver_inbound(&mut self) {
        for (peer, session) in &mut self.sessions {
            for message in session.drain_outbox() {
                for reply in self.authority.handle(*peer, message, self.now) {
                    session.receive(reply, self.now);
                }
            }
        }
    }

    fn route(&mut self, outbound: Vec<Outbound>) {
        for Outbound { target, batch } in outbound {
            for (peer, session) in &mut self.sessions {
                let wanted = match target {
                    Target::All => self.authority.has_peer(*peer),
                    Target::Peer(p) => p == *peer,
                };
                if wanted {
                    session.receive(ServerMessage::Snapshot(batch.clone()), self.now);
                }
            }
        }
    }

    /// One full round trip: inbound, authority tick, broadcast, mirror tick.
    fn pump(&mut self) -> Vec<Outbound> {
        self.now += DT_MS;
        self.deliver_inbound();
        let outbound = self.authority.tick(DT, self.now);
        self.route(outbound.clone());
        for (_, session) in &mut self.sessions {
            session.tick(DT, self.now).unwrap();
        }
        outbound
    }

    fn pump_for(&mut self, ticks: usize) {
        for _ in 0..ticks {
            self.pump();
        }
    }

    fn ship_of(&self, index: usize) -> Option<EntityId> {
        let peer = self.sessions[index].0;
        self.authority.peer(peer).and_then(|p| p.ship)
    }
}

fn replicated(world: &World) -> Vec<EntityId> {
    let mut ids = world.ids_with_tag(Tags::NETWORK);
    ids.sort();
    ids
}

#[test]
fn test_mirror_matches_authority_after_join() {
    let mut harness = Harness::new(AsteroidField {
        small: 4,
        medium: 2,
        large: 1,
    });
    let a = harness.join(1);
    harness.pump_for(3);

    let session = &harness.sessions[a].1;
    assert!(session.player().is_some());
    assert_eq!(
        replicated(session.world()),
        replicated(harness.authority.world())
    );
    assert_eq!(session.world().bounds(), harness.authority.world().bounds());
}

#[test]
fn test_thrust_delta_carries_motion_only() {
    let mut harness = Harness::new(AsteroidField::EMPTY);
    let a = harness.join(1);
    harness.send(a, ClientMessage::SpawnShip(ShipConfig::default()));
    harness.pump_for(5);
    let ship = harness.ship_of(a).expect("ship spawned");

    harness.send(a, ClientMessage::Thrust(true));
    let mut motion = Vec::new();
    for _ in 0..10 {
        for outbound in harness.pump() {
            motion.extend(
                outbound
                    .batch
                    .objects
                    .into_iter()
                    .filter(|o| o.id == ship && o.update != UpdateKind::Full && o.has("position")),
            );
        }
    }

    assert!(!motion.is_empty());
    for wire in &motion {
        assert!(wire.has("velocity"));
        assert!(!wire.has("radius"));
        assert!(!wire.has("mass"));
    }
}

#[test]
fn test_disconnect_reaches_third_peer() {
    let mut harness = Harness::new(AsteroidField::EMPTY);
    let a = harness.join(1);
    harness.join(2);
    let c = harness.join(3);
    harness.send(a, ClientMessage::SpawnShip(ShipConfig::default()));
    harness.pump_for(5);

    let ship = harness.ship_of(a).expect("ship spawned");
    let player = harness.authority.peer(PeerId(1)).unwrap().player;
    assert!(harness.sessions[c].1.world().contains(ship));
    assert!(harness.sessions[c].1.world().contains(player));

    assert!(harness.authority.disconnect(PeerId(1), DisconnectReason::Graceful));
    harness.pump_for(2);

    let world = harness.sessions[c].1.world();
    assert!(!world.contains(ship));
    assert!(!world.contains(player));
    assert_eq!(replicated(world), replicated(harness.authority.world()));
}

#[test]
fn test_repeated_batch_is_idempotent() {
    let mut harness = Harness::new(AsteroidField {
        small: 3,
        medium: 0,
        large: 0,
    });
    harness.join(1);
    harness.deliver_inbound();
    harness.now += DT_MS;
    let outbound = harness.authority.tick(DT, harness.now);
    let listing = outbound
        .iter()
        .find(|o| o.target == Target::Peer(PeerId(1)))
        .expect("join listing")
        .batch
        .clone();

    let mut once = ClientSession::new(MirrorConfig::default());
    once.receive(ServerMessage::Snapshot(listing.clone()), harness.now);
    once.tick(DT, harness.now).unwrap();

    let mut twice = ClientSession::new(MirrorConfig::default());
    twice.receive(ServerMessage::Snapshot(listing.clone()), harness.now);
    twice.receive(ServerMessage::Snapshot(listing), harness.now);
    let report = twice.tick(DT, harness.now).unwrap();

    assert_eq!(report.batches, 2);
    assert_eq!(replicated(once.world()), replicated(twice.world()));
    for id in replicated(once.world()) {
        let a = once.world().get(id).unwrap();
        let b = twice.world().get(id).unwrap();
        assert_eq!(a.kind(), b.kind());
        assert_eq!(a.body().map(|b| b.radius), b.body().map(|b| b.radius));
    }
}

#[test]
fn test_forward_reference_heals_through_resync() {
    let mut harness = Harness::new(AsteroidField::EMPTY);
    let a = harness.join(1);
    harness.send(a, ClientMessage::SpawnShip(ShipConfig::default()));
    harness.pump_for(3);
    let ship = harness.ship_of(a).expect("ship spawned");

    // a late joiner whose listing lost every player
    let late = PeerId(9);
    harness.authority.handle(late, ClientMessage::Introduce, harness.now);
    harness.now += DT_MS;
    let outbound = harness.authority.tick(DT, harness.now);
    let mut listing = outbound
        .into_iter()
        .find(|o| o.target == Target::Peer(late))
        .expect("join listing")
        .batch;
    listing.objects.retain(|o| o.kind != "Player");

    let mut session = ClientSession::new(MirrorConfig::default());
    session.connect(harness.now);
    session.drain_outbox();
    session.receive(ServerMessage::Snapshot(listing), harness.now);
    let report = session.tick(DT, harness.now).unwrap();
    assert!(report.missing_owner > 0);
    assert!(!session.world().contains(ship));

    let requests = session.drain_outbox();
    assert!(requests.contains(&ClientMessage::Resync));
    for message in requests {
        for reply in harness.authority.handle(late, message, harness.now) {
            session.receive(reply, harness.now);
        }
    }
    harness.now += DT_MS;
    for outbound in harness.authority.tick(DT, harness.now) {
        if outbound.target == Target::Peer(late) {
            session.receive(ServerMessage::Snapshot(outbound.batch), harness.now);
        }
    }
    session.tick(DT, harness.now).unwrap();
    assert!(session.world().contains(ship));
}

fn ship_at(world: &mut World, x: f32, vx: f32, config: ShipConfig) -> EntityId {
    let mut ship = arena::entity::Ship::new(EntityId(900), &config);
    ship.body.position = Vec2::new(x, 0.0);
    ship.body.velocity = Vec2::new(vx, 0.0);
    world.spawn(EntityData::Ship(ship)).unwrap()
}

#[test]
fn test_head_on_collision_is_symmetric() {
    let mut world = World::new(Role::Authority, 1);
    let left = ship_at(&mut world, -35.0, 300.0, ShipConfig::default());
    let right = ship_at(&mut world, 35.0, -300.0, ShipConfig::default());

    let report = CollisionSystem::new().step(&mut world, DT);
    assert_eq!(report.contacts, 1);

    let l = world.get(left).and_then(|e| e.body()).cloned().unwrap();
    let r = world.get(right).and_then(|e| e.body()).cloned().unwrap();
    assert!((l.velocity + r.velocity).length() < 1e-3);
    assert!((l.position + r.position).length() < 1e-3);
    assert!(l.velocity.x < 0.0);

    let mut destroyed = report.destroyed_ships.clone();
    destroyed.sort();
    assert_eq!(destroyed, vec![left, right]);
}

#[test]
fn test_shield_drain_is_monotonic() {
    let mut world = World::new(Role::Authority, 1);
    let config = ShipConfig {
        special: SpecialKind::Shield,
        ..Default::default()
    };
    let ship = ship_at(&mut world, 0.0, 0.0, config);
    world.get_mut(ship).unwrap().as_ship_mut().unwrap().special(true);

    let mut system = CollisionSystem::new();
    let mut last = 100.0_f32;
    for _ in 0..8 {
        let mut rock = Asteroid::new(50.0, 20.0);
        rock.body.position = Vec2::new(55.0, 0.0);
        rock.body.velocity = Vec2::new(-400.0, 0.0);
        let rock = world.spawn(EntityData::Asteroid(rock)).unwrap();

        let report = system.step(&mut world, DT);
        assert!(report.destroyed_ships.is_empty());
        world.remove(rock);

        let entity = world.get_mut(ship).unwrap();
        let state = entity.as_ship_mut().unwrap();
        let status = state.special.shield_status().unwrap();
        assert!(status <= last);
        assert!(status >= 0.0);
        assert!(!state.destroying);
        last = status;
        state.body.position = Vec2::ZERO;
        state.body.velocity = Vec2::ZERO;
    }
    assert!(last < 100.0);
}

#[test]
fn test_shield_absorbs_bullet_hit() {
    let mut world = World::new(Role::Authority, 1);
    let config = ShipConfig {
        special: SpecialKind::Shield,
        ..Default::default()
    };
    let ship = ship_at(&mut world, 0.0, 0.0, config);
    world.get_mut(ship).unwrap().as_ship_mut().unwrap().special(true);
    let bullet = world
        .spawn(EntityData::Bullet(Bullet::new(
            EntityId(777),
            "#f00",
            Vec2::new(-40.0, 0.0),
            Vec2::new(500.0, 0.0),
        )))
        .unwrap();

    let report = CollisionSystem::new().step(&mut world, DT);
    assert_eq!(report.absorbed, vec![(ship, 500.0)]);
    assert_eq!(report.spent_bullets, vec![bullet]);
    assert!(report.destroyed_ships.is_empty());

    let state = world.get(ship).unwrap().as_ship().unwrap();
    let power = state.special.power();
    assert_eq!(state.special.shield_status(), Some(100.0 - 500.0 / power));
    assert!(!state.destroying);
}

#[test]
fn test_spent_bullet_leaves_the_world() {
    let mut world = World::new(Role::Authority, 1);
    let config = ShipConfig {
        special: SpecialKind::Shield,
        ..Default::default()
    };
    let ship = ship_at(&mut world, 0.0, 0.0, config);
    world.get_mut(ship).unwrap().as_ship_mut().unwrap().special(true);
    let bullet = world
        .spawn(EntityData::Bullet(Bullet::new(
            EntityId(777),
            "#f00",
            Vec2::new(-40.0, 0.0),
            Vec2::new(500.0, 0.0),
        )))
        .unwrap();

    let report = Simulation::new().step(&mut world, DT);
    assert!(report.removed.contains(&bullet));
    assert!(!world.contains(bullet));
    assert!(world.contains(ship));
    assert!(!world.get(ship).unwrap().is_destroying());
}

#[test]
fn test_busy_join_listing_fits_datagrams() {
    let mut harness = Harness::new(AsteroidField::default());
    for peer in 1..=31 {
        let index = harness.join(peer);
        harness.send(index, ClientMessage::SpawnShip(ShipConfig::default()));
        harness.send(index, ClientMessage::Fire(true));
    }
    harness.pump_for(30);

    let late = harness.join(32);
    let outbound = harness.pump();
    let chunks: Vec<_> = outbound
        .iter()
        .filter(|o| o.target == Target::Peer(PeerId(32)))
        .map(|o| &o.batch)
        .collect();
    assert!(chunks.len() > 1);
    assert_eq!(chunks.iter().filter(|b| b.full_sync).count(), 1);
    assert!(chunks.last().unwrap().full_sync);
    for batch in &chunks {
        let packet = Packet::new(
            PacketHeader::new(1),
            PacketType::Server(ServerMessage::Snapshot((*batch).clone())),
        );
        assert!(packet.serialize().is_ok());
    }

    let world = harness.sessions[late].1.world();
    for id in harness.authority.world().ids_with_tag(Tags::NETWORK) {
        let kind = harness.authority.world().get(id).unwrap().kind();
        if kind == EntityKind::Player {
            assert!(world.contains(id));
        }
    }
}
