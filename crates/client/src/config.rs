use std::net::SocketAddr;
use std::time::Duration;

use arena::{MirrorConfig, ShipConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotate {
    Cw,
    Ccw,
}

/// Controls held for the whole session, re-sent after every respawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Controls {
    pub thrust: bool,
    pub fire: bool,
    pub rotate: Option<Rotate>,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server: SocketAddr,
    pub name: String,
    pub ship: ShipConfig,
    pub controls: Controls,
    pub tick_rate: u32,
    /// Stop after this long; `None` runs until the server goes away.
    pub duration: Option<Duration>,
    pub summary_interval: Duration,
    /// Wait before introducing again after losing the session; `None` quits
    /// instead.
    pub reconnect: Option<Duration>,
    /// A spawn request with no ship to show for it is repeated after this.
    pub spawn_retry: Duration,
    pub mirror: MirrorConfig,
}

impl ClientConfig {
    pub fn new(server: SocketAddr) -> Self {
        Self {
            server,
            name: arena::entity::DEFAULT_PLAYER_NAME.to_string(),
            ship: ShipConfig::default(),
            controls: Controls::default(),
            tick_rate: arena::DEFAULT_TICK_RATE,
            duration: None,
            summary_interval: Duration::from_secs(1),
            reconnect: Some(Duration::from_secs(2)),
            spawn_retry: Duration::from_secs(3),
            mirror: MirrorConfig::default(),
        }
    }
}
