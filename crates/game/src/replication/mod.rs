mod codec;
mod property;
mod wire;

pub use codec::{
    DecodeError, ValueError, decode, encode, expect_bool, expect_f32, expect_id, expect_int,
    expect_special, expect_text, expect_vec2, has_optional_fields, refresh_shadow,
};
pub use property::{Equality, Field, Layout, LayoutBuilder, Property, PropertyOptions, Shadow};
pub use wire::{ListingChunk, SnapshotBatch, SpecialWire, UpdateKind, WireField, WireObject, WireValue};
