use std::net::SocketAddr;

use arena::{AuthorityEvent, DisconnectReason, EntityId, PeerId};

#[derive(Debug, Clone)]
pub enum ServerEvent {
    Listening {
        addr: SocketAddr,
    },
    PeerJoined {
        peer: PeerId,
        addr: Option<SocketAddr>,
        player: EntityId,
    },
    PeerLeft {
        peer: PeerId,
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
        reason: String,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    pub fn from_authority(event: AuthorityEvent, addr: Option<SocketAddr>) -> Self {
        match event {
            AuthorityEvent::PeerJoined { peer, player } => ServerEvent::PeerJoined { peer, addr, player },
            AuthorityEvent::PeerLeft { peer, reason, .. } => ServerEvent::PeerLeft { peer, reason },
            AuthorityEvent::ShipSpawned { peer, ship } => ServerEvent::ShipSpawned { peer, ship },
            AuthorityEvent::ShipDestroyed { ship } => ServerEvent::ShipDestroyed { ship },
            AuthorityEvent::Rejected { peer, error } => ServerEvent::Rejected {
                peer,
                reason: error.to_string(),
            },
        }
    }

    pub fn is_problem(&self) -> bool {
        matches!(self, ServerEvent::Rejected { .. } | ServerEvent::Error { .. })
    }

    pub fn describe(&self) -> String {
        match self {
            ServerEvent::Listening { addr } => format!("Listening on {}", addr),
            ServerEvent::PeerJoined { peer, addr, player } => match addr {
                Some(addr) => format!("{} joined from {} (player {})", peer, addr, player),
                None => format!("{} joined (player {})", peer, player),
            },
            ServerEvent::PeerLeft { peer, reason } => format!("{} {}", peer, reason.as_str()),
            ServerEvent::ShipSpawned { peer, ship } => format!("{} spawned ship {}", peer, ship),
            ServerEvent::ShipDestroyed { ship } => format!("Ship {} destroyed", ship),
            ServerEvent::Rejected { peer, reason } => format!("Rejected {}: {}", peer, reason),
            ServerEvent::Error { message } => message.clone(),
        }
    }
}
