use std::fmt;
use std::ops::RangeInclusive;

use rkyv::{Archive, Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Archive, Serialize, Deserialize,
)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct EntityId(pub u32);

impl EntityId {
    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn is_authority(self) -> bool {
        IdRange::AUTHORITY.contains(self)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A partition of the id space. The authority allocates from the low half and
/// every client allocates locally created objects from the high half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdRange {
    pub min: u32,
    pub max: u32,
}

impl IdRange {
    pub const AUTHORITY: IdRange = IdRange {
        min: 1,
        max: 0x7FFF_FFFF,
    };
    pub const LOCAL: IdRange = IdRange {
        min: 0x8000_0000,
        max: u32::MAX,
    };

    pub fn contains(&self, id: EntityId) -> bool {
        self.as_range().contains(&id.0)
    }

    pub fn as_range(&self) -> RangeInclusive<u32> {
        self.min..=self.max
    }
}

#[derive(Debug)]
pub struct IdAllocator {
    range: IdRange,
    next: Option<u32>,
}

impl IdAllocator {
    pub fn new(range: IdRange) -> Self {
        Self {
            range,
            next: Some(range.min),
        }
    }

    pub fn range(&self) -> IdRange {
        self.range
    }

    /// Hands out the next id. Ids are never handed out twice, so an exhausted
    /// range stays exhausted.
    pub fn allocate(&mut self) -> Option<EntityId> {
        let id = self.next?;
        self.next = if id >= self.range.max {
            None
        } else {
            Some(id + 1)
        };
        Some(EntityId(id))
    }

    /// Moves the cursor past an id that was claimed elsewhere.
    pub fn reserve(&mut self, id: EntityId) {
        if !self.range.contains(id) {
            return;
        }
        if let Some(next) = self.next {
            if id.0 >= next {
                self.next = if id.0 >= self.range.max {
                    None
                } else {
                    Some(id.0 + 1)
                };
            }
        }
    }
}
