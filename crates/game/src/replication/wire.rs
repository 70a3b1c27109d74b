use glam::Vec2;
use rkyv::{Archive, Deserialize, Serialize, rancor};

use crate::entity::{EntityId, SpecialKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub enum UpdateKind {
    /// Unconditional resync: every property is present.
    Full,
    /// Periodic sweep, shadow-diffed.
    Delta,
    /// Explicitly requested change; smoothed like a delta.
    Default,
    /// Delta the receiver must apply without smoothing.
    NoLerp,
    Delete,
}

impl UpdateKind {
    /// Higher wins when two requests for one entity meet in the same cycle.
    pub fn precedence(self) -> u8 {
        match self {
            UpdateKind::Delta => 0,
            UpdateKind::Default => 1,
            UpdateKind::NoLerp => 2,
            UpdateKind::Full => 3,
            UpdateKind::Delete => 4,
        }
    }

    pub fn merge(self, other: UpdateKind) -> UpdateKind {
        if other.precedence() > self.precedence() {
            other
        } else {
            self
        }
    }

    pub fn changes_only(self) -> bool {
        !matches!(self, UpdateKind::Full)
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct SpecialWire {
    pub kind: SpecialKind,
    pub power: f32,
    pub on: bool,
    pub status: f32,
    pub ready: bool,
    pub jumping: bool,
    pub from: Option<[f32; 2]>,
    pub to: Option<[f32; 2]>,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum WireValue {
    Bool(bool),
    Int(i64),
    Float(f32),
    Text(String),
    Vec2([f32; 2]),
    Id(EntityId),
    Special(SpecialWire),
}

impl WireValue {
    pub fn vec2(v: Vec2) -> Self {
        WireValue::Vec2(v.to_array())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            WireValue::Bool(_) => "bool",
            WireValue::Int(_) => "int",
            WireValue::Float(_) => "float",
            WireValue::Text(_) => "text",
            WireValue::Vec2(_) => "vec2",
            WireValue::Id(_) => "id",
            WireValue::Special(_) => "special",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            WireValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            WireValue::Float(f) => Some(*f),
            WireValue::Int(i) => Some(*i as f32),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            WireValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            WireValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_vec2(&self) -> Option<Vec2> {
        match self {
            WireValue::Vec2(v) => Some(Vec2::from_array(*v)),
            _ => None,
        }
    }

    pub fn as_id(&self) -> Option<EntityId> {
        match self {
            WireValue::Id(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_special(&self) -> Option<&SpecialWire> {
        match self {
            WireValue::Special(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct WireField {
    pub name: String,
    pub value: WireValue,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct WireObject {
    pub kind: String,
    pub id: EntityId,
    pub update: UpdateKind,
    pub fields: Vec<WireField>,
}

impl WireObject {
    pub fn new(kind: impl Into<String>, id: EntityId, update: UpdateKind) -> Self {
        Self {
            kind: kind.into(),
            id,
            update,
            fields: Vec::new(),
        }
    }

    pub fn delete(kind: impl Into<String>, id: EntityId) -> Self {
        Self::new(kind, id, UpdateKind::Delete)
    }

    pub fn push(&mut self, name: impl Into<String>, value: WireValue) {
        self.fields.push(WireField {
            name: name.into(),
            value,
        });
    }

    pub fn get(&self, name: &str) -> Option<&WireValue> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| &field.value)
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    /// Bytes this object takes once archived, used to pack datagrams.
    pub fn archived_len(&self) -> usize {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|bytes| bytes.len())
            .unwrap_or(usize::MAX)
    }
}

/// Position of a batch within a join listing that spans several datagrams.
/// The last chunk is the one carrying `full_sync`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct ListingChunk {
    pub index: u16,
    pub count: u16,
}

impl ListingChunk {
    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.count
    }
}

/// The unit actually transmitted to peers.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct SnapshotBatch {
    /// Authority wall clock at send time, in milliseconds.
    pub timestamp: u64,
    pub min_tick_interval: u32,
    /// Authority wall clock of the simulation tick the objects were taken from.
    pub last_tick_time: u64,
    /// Set on the batch that completes a listing of every live replicated
    /// entity.
    pub full_sync: bool,
    /// Present on every batch of a join listing.
    pub listing: Option<ListingChunk>,
    pub objects: Vec<WireObject>,
}

impl SnapshotBatch {
    pub fn new(timestamp: u64, min_tick_interval: u32, last_tick_time: u64) -> Self {
        Self {
            timestamp,
            min_tick_interval,
            last_tick_time,
            full_sync: false,
            listing: None,
            objects: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Milliseconds between the simulated state and the moment it was sent.
    pub fn send_lag(&self) -> u64 {
        self.timestamp.saturating_sub(self.last_tick_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_stronger_kind() {
        assert_eq!(UpdateKind::Delta.merge(UpdateKind::Full), UpdateKind::Full);
        assert_eq!(UpdateKind::Full.merge(UpdateKind::Delta), UpdateKind::Full);
        assert_eq!(UpdateKind::NoLerp.merge(UpdateKind::Default), UpdateKind::NoLerp);
        assert_eq!(UpdateKind::Full.merge(UpdateKind::Delete), UpdateKind::Delete);
    }

    #[test]
    fn wire_object_lookup() {
        let mut obj = WireObject::new("Asteroid", EntityId(4), UpdateKind::Delta);
        obj.push("radius", WireValue::Float(5.0));
        assert_eq!(obj.get("radius").and_then(WireValue::as_f32), Some(5.0));
        assert!(!obj.has("mass"));
    }

    #[test]
    fn int_reads_as_float() {
        assert_eq!(WireValue::Int(3).as_f32(), Some(3.0));
        assert_eq!(WireValue::Text("3".into()).as_f32(), None);
    }
}
