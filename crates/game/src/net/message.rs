use rkyv::{Archive, Deserialize, Serialize};

use crate::entity::{EntityId, ShipConfig};
use crate::replication::SnapshotBatch;

/// Everything a peer can say to the authority.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum ClientMessage {
    Introduce,
    /// Carries the sender's clock; echoed back untouched.
    Echo {
        timestamp: u64,
    },
    UpdatePlayer {
        id: EntityId,
        name: String,
    },
    SpawnShip(ShipConfig),
    RotateCw(bool),
    RotateCcw(bool),
    Thrust(bool),
    Fire(bool),
    Special(bool),
    /// Asks for a fresh full listing after a gap was noticed.
    Resync,
}

impl ClientMessage {
    pub fn name(&self) -> &'static str {
        match self {
            ClientMessage::Introduce => "introduce",
            ClientMessage::Echo { .. } => "echo",
            ClientMessage::UpdatePlayer { .. } => "updatePlayer",
            ClientMessage::SpawnShip(_) => "spawnShip",
            ClientMessage::RotateCw(_) => "rotateCW",
            ClientMessage::RotateCcw(_) => "rotateCCW",
            ClientMessage::Thrust(_) => "thrust",
            ClientMessage::Fire(_) => "fire",
            ClientMessage::Special(_) => "special",
            ClientMessage::Resync => "resync",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum ServerMessage {
    Welcome { player: EntityId },
    EchoReply { timestamp: u64 },
    Snapshot(SnapshotBatch),
    /// Non-fatal unless `rejoin` is set: the authority holds no session for
    /// the sender, which has to introduce itself again.
    ErrorNotice { message: String, rejoin: bool },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_distinct() {
        let all = [
            ClientMessage::Introduce,
            ClientMessage::Echo { timestamp: 0 },
            ClientMessage::UpdatePlayer {
                id: EntityId(1),
                name: String::new(),
            },
            ClientMessage::SpawnShip(ShipConfig::default()),
            ClientMessage::RotateCw(true),
            ClientMessage::RotateCcw(true),
            ClientMessage::Thrust(true),
            ClientMessage::Fire(true),
            ClientMessage::Special(true),
            ClientMessage::Resync,
        ];
        let mut names: Vec<_> = all.iter().map(ClientMessage::name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), all.len());
    }
}
