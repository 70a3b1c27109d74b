use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u32);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer{}", self.0)
    }
}

/// Maps socket addresses to peer ids. Ids are never reused.
#[derive(Debug, Default)]
pub struct PeerTable {
    by_addr: HashMap<SocketAddr, PeerId>,
    by_id: HashMap<PeerId, SocketAddr>,
    next_id: u32,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id of `addr`, allocating one on first contact. The flag is true
    /// for a new address.
    pub fn get_or_insert(&mut self, addr: SocketAddr) -> (PeerId, bool) {
        if let Some(&id) = self.by_addr.get(&addr) {
            return (id, false);
        }
        self.next_id += 1;
        let id = PeerId(self.next_id);
        self.by_addr.insert(addr, id);
        self.by_id.insert(id, addr);
        (id, true)
    }

    pub fn id_of(&self, addr: &SocketAddr) -> Option<PeerId> {
        self.by_addr.get(addr).copied()
    }

    pub fn addr_of(&self, id: PeerId) -> Option<SocketAddr> {
        self.by_id.get(&id).copied()
    }

    pub fn remove(&mut self, id: PeerId) -> Option<SocketAddr> {
        let addr = self.by_id.remove(&id)?;
        self.by_addr.remove(&addr);
        Some(addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PeerId, SocketAddr)> + '_ {
        self.by_id.iter().map(|(&id, &addr)| (id, addr))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
