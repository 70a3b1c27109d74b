mod endpoint;
mod message;
mod peers;
mod protocol;
mod stats;
mod tracking;

pub use endpoint::NetworkEndpoint;
pub use message::{ClientMessage, ServerMessage};
pub use peers::{PeerId, PeerTable};
pub use protocol::{
    DEFAULT_PORT, DEFAULT_TICK_RATE, MAX_PACKET_SIZE, PROTOCOL_MAGIC, PROTOCOL_VERSION, Packet,
    PacketError, PacketHeader, PacketType, sequence_greater_than,
};
pub use stats::NetworkStats;
pub use tracking::ReceiveTracker;
