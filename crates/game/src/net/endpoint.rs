use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use log::trace;

use super::protocol::{MAX_PACKET_SIZE, Packet, PacketHeader, PacketType};
use super::stats::NetworkStats;
use super::tracking::ReceiveTracker;

/// Non-blocking UDP socket speaking `Packet` frames.
pub struct NetworkEndpoint {
    socket: UdpSocket,
    local_addr: SocketAddr,
    remote_addr: Option<SocketAddr>,
    stats: NetworkStats,
    recv_buffer: Vec<u8>,
    send_sequence: u32,
    trackers: HashMap<SocketAddr, ReceiveTracker>,
}

impl NetworkEndpoint {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;

        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            remote_addr: None,
            stats: NetworkStats::default(),
            recv_buffer: vec![0u8; MAX_PACKET_SIZE],
            send_sequence: 0,
            trackers: HashMap::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn set_remote(&mut self, addr: SocketAddr) {
        self.remote_addr = Some(addr);
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    /// Frames `payload` with the next sequence number and sends it.
    pub fn send_to(&mut self, payload: PacketType, addr: SocketAddr) -> io::Result<usize> {
        self.send_sequence = self.send_sequence.wrapping_add(1);
        let packet = Packet::new(PacketHeader::new(self.send_sequence), payload);
        let data = packet
            .serialize()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

        let bytes = self.socket.send_to(&data, addr)?;
        self.stats.record_sent(bytes);
        Ok(bytes)
    }

    pub fn send(&mut self, payload: PacketType) -> io::Result<usize> {
        let addr = self
            .remote_addr
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no remote address set"))?;
        self.send_to(payload, addr)
    }

    /// Drains every datagram waiting on the socket. Undecodable, foreign and
    /// duplicated frames are counted and dropped.
    pub fn receive(&mut self) -> io::Result<Vec<(Packet, SocketAddr)>> {
        let mut packets = Vec::new();

        loop {
            match self.socket.recv_from(&mut self.recv_buffer) {
                Ok((size, addr)) => {
                    let packet = match Packet::deserialize(&self.recv_buffer[..size]) {
                        Ok(packet) if packet.header.is_valid() => packet,
                        Ok(_) | Err(_) => {
                            trace!("dropping {} byte datagram from {}", size, addr);
                            self.stats.packets_dropped += 1;
                            continue;
                        }
                    };
                    let tracker = self.trackers.entry(addr).or_default();
                    if !tracker.record_received(packet.header.sequence) {
                        trace!("duplicate sequence {} from {}", packet.header.sequence, addr);
                        self.stats.packets_dropped += 1;
                        continue;
                    }

                    self.stats.record_received(size);
                    packets.push((packet, addr));
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }

        Ok(packets)
    }

    /// Drops the duplicate filter kept for a sender that went away.
    pub fn forget(&mut self, addr: &SocketAddr) {
        self.trackers.remove(addr);
    }
}
