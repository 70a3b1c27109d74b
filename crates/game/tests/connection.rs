use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::thread;
use std::time::Duration;

use arena::{
    Authority, AuthorityConfig, AsteroidField, ClientMessage, ClientSession, MirrorConfig,
    NetworkEndpoint, Packet, PacketHeader, PacketType, PeerTable, ServerMessage, Target,
};

static PORT_COUNTER: AtomicU16 = AtomicU16::new(41000);

fn next_port() -> u16 {
    PORT_COUNTER.fetch_add(10, Ordering::SeqCst)
}

fn loopback(port: u16) -> SocketAddr {
    format!("127.0.0.1:{}", port).parse().unwrap()
}

fn wait_for_packet(
    endpoint: &mut NetworkEndpoint,
    timeout_ms: u64,
) -> Option<Vec<(Packet, SocketAddr)>> {
    let start = std::time::Instant::now();
    while start.elapsed() < Duration::from_millis(timeout_ms) {
        let received = endpoint.receive().unwrap();
        if !received.is_empty() {
            return Some(received);
        }
        thread::sleep(Duration::from_millis(1));
    }
    None
}

#[test]
fn test_introduce_over_udp() {
    let port = next_port();
    let mut server = NetworkEndpoint::bind(loopback(port)).unwrap();
    let mut client = NetworkEndpoint::bind(loopback(port + 1)).unwrap();
    client.set_remote(server.local_addr());

    client
        .send(PacketType::Client(ClientMessage::Introduce))
        .unwrap();

    let received = wait_for_packet(&mut server, 500).expect("no packet received");
    assert_eq!(received.len(), 1);
    let (packet, from) = &received[0];
    assert_eq!(*from, client.local_addr());
    assert_eq!(packet.payload, PacketType::Client(ClientMessage::Introduce));

    let mut peers = PeerTable::new();
    let (peer, fresh) = peers.get_or_insert(*from);
    assert!(fresh);

    let mut authority = Authority::new(AuthorityConfig {
        asteroids: AsteroidField::EMPTY,
        background: false,
        ..Default::default()
    })
    .unwrap();
    for reply in authority.handle(peer, ClientMessage::Introduce, 0) {
        server.send_to(PacketType::Server(reply), *from).unwrap();
    }

    let received = wait_for_packet(&mut client, 500).expect("no welcome");
    assert!(matches!(
        received[0].0.payload,
        PacketType::Server(ServerMessage::Welcome { .. })
    ));
    assert_eq!(server.stats().packets_sent, 1);
    assert_eq!(client.stats().packets_received, 1);
}

#[test]
fn test_duplicate_and_foreign_datagrams_are_dropped() {
    let port = next_port();
    let mut server = NetworkEndpoint::bind(loopback(port)).unwrap();
    let raw = std::net::UdpSocket::bind(loopback(port + 1)).unwrap();

    let packet = Packet::new(
        PacketHeader::new(7),
        PacketType::Client(ClientMessage::Echo { timestamp: 42 }),
    );
    let bytes = packet.serialize().unwrap();
    raw.send_to(&bytes, server.local_addr()).unwrap();
    raw.send_to(&bytes, server.local_addr()).unwrap();
    raw.send_to(b"not a packet", server.local_addr()).unwrap();

    thread::sleep(Duration::from_millis(20));
    let received = wait_for_packet(&mut server, 500).expect("no packet received");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].0.header.sequence, 7);
    assert_eq!(server.stats().packets_dropped, 2);

    // a forgotten sender starts over
    server.forget(&raw.local_addr().unwrap());
    raw.send_to(&bytes, server.local_addr()).unwrap();
    assert_eq!(wait_for_packet(&mut server, 500).map(|r| r.len()), Some(1));
}

#[test]
fn test_full_session_over_loopback() {
    let port = next_port();
    let mut server = NetworkEndpoint::bind(loopback(port)).unwrap();
    let mut client = NetworkEndpoint::bind(loopback(port + 1)).unwrap();
    client.set_remote(server.local_addr());

    let mut authority = Authority::new(AuthorityConfig {
        asteroids: AsteroidField {
            small: 3,
            medium: 0,
            large: 0,
        },
        background: false,
        ..Default::default()
    })
    .unwrap();
    let mut peers = PeerTable::new();
    let mut session = ClientSession::new(MirrorConfig::default());
    session.connect(0);

    let dt = 1.0 / 60.0;
    for tick in 1..=20u64 {
        let now = tick * 16;
        for message in session.drain_outbox() {
            client.send(PacketType::Client(message)).unwrap();
        }
        thread::sleep(Duration::from_millis(2));

        for (packet, from) in server.receive().unwrap() {
            let (peer, _) = peers.get_or_insert(from);
            if let PacketType::Client(message) = packet.payload {
                for reply in authority.handle(peer, message, now) {
                    server.send_to(PacketType::Server(reply), from).unwrap();
                }
            }
        }
        for outbound in authority.tick(dt, now) {
            let targets: Vec<SocketAddr> = match outbound.target {
                Target::All => authority
                    .peer_ids()
                    .into_iter()
                    .filter_map(|p| peers.addr_of(p))
                    .collect(),
                Target::Peer(p) => peers.addr_of(p).into_iter().collect(),
            };
            for addr in targets {
                server
                    .send_to(PacketType::Server(ServerMessage::Snapshot(outbound.batch.clone())), addr)
                    .unwrap();
            }
        }
        thread::sleep(Duration::from_millis(2));

        for (packet, _) in client.receive().unwrap() {
            if let PacketType::Server(message) = packet.payload {
                session.receive(message, now);
            }
        }
        session.tick(dt, now).unwrap();
    }

    assert!(session.player().is_some());
    assert!(session.world().bounds().is_some());
    assert_eq!(session.world().ids_with_tag(arena::Tags::ASTEROID).len(), 3);
    assert!(session.clock().rtt().is_some());

    client.send(PacketType::Disconnect).unwrap();
    let received = wait_for_packet(&mut server, 500).expect("no disconnect");
    assert!(received.iter().any(|(p, _)| p.payload == PacketType::Disconnect));
}
