use crate::entity::EntityId;
use crate::net::PeerId;

/// A point in time after which something is considered lost unless it is
/// pushed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    timeout_ms: u64,
    expires_at_ms: u64,
}

impl Deadline {
    pub fn new(timeout_ms: u64, now_ms: u64) -> Self {
        Self {
            timeout_ms,
            expires_at_ms: now_ms.saturating_add(timeout_ms),
        }
    }

    pub fn reset(&mut self, now_ms: u64) {
        self.expires_at_ms = now_ms.saturating_add(self.timeout_ms);
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

/// One introduced connection. Owns its player entity, its live ship (if any)
/// and both of its timeout deadlines.
#[derive(Debug, Clone, PartialEq)]
pub struct Peer {
    pub id: PeerId,
    pub player: EntityId,
    pub ship: Option<EntityId>,
    /// Pushed back by any inbound message.
    idle: Deadline,
    /// Pushed back only by echoes.
    connection: Deadline,
}

impl Peer {
    pub fn new(id: PeerId, player: EntityId, idle_ms: u64, connection_ms: u64, now_ms: u64) -> Self {
        Self {
            id,
            player,
            ship: None,
            idle: Deadline::new(idle_ms, now_ms),
            connection: Deadline::new(connection_ms, now_ms),
        }
    }

    pub fn touch(&mut self, now_ms: u64) {
        self.idle.reset(now_ms);
    }

    pub fn echoed(&mut self, now_ms: u64) {
        self.connection.reset(now_ms);
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.idle.is_expired(now_ms) || self.connection.is_expired(now_ms)
    }
}
