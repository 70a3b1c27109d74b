use glam::Vec2;
use log::{trace, warn};

use super::property::{Field, Layout};
use super::wire::{SpecialWire, UpdateKind, WireObject, WireValue};
use crate::entity::{Entity, EntityId};

/// One wire field carried a value the target property cannot hold.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueError {
    #[error("expected {expected}, found {found}")]
    WrongType {
        expected: &'static str,
        found: &'static str,
    },
    #[error("unknown variant {0:?}")]
    UnknownVariant(String),
    #[error("field {0:?} is not carried by this entity")]
    NotCarried(Field),
}

/// Decode was handed a wire object meant for a different entity. Always a
/// reconciliation bug, never a network condition.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("id mismatch during decode: entity {expected}, wire {found}")]
    IdMismatch { expected: EntityId, found: EntityId },
    #[error("type mismatch during decode: entity {expected}, wire {found:?}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },
}

fn wrong(expected: &'static str, value: &WireValue) -> ValueError {
    ValueError::WrongType {
        expected,
        found: value.type_name(),
    }
}

pub fn expect_bool(value: &WireValue) -> Result<bool, ValueError> {
    value.as_bool().ok_or_else(|| wrong("bool", value))
}

pub fn expect_f32(value: &WireValue) -> Result<f32, ValueError> {
    value.as_f32().ok_or_else(|| wrong("float", value))
}

pub fn expect_int(value: &WireValue) -> Result<i64, ValueError> {
    value.as_int().ok_or_else(|| wrong("int", value))
}

pub fn expect_vec2(value: &WireValue) -> Result<Vec2, ValueError> {
    value.as_vec2().ok_or_else(|| wrong("vec2", value))
}

pub fn expect_text(value: &WireValue) -> Result<&str, ValueError> {
    value.as_text().ok_or_else(|| wrong("text", value))
}

pub fn expect_id(value: &WireValue) -> Result<EntityId, ValueError> {
    value.as_id().ok_or_else(|| wrong("id", value))
}

pub fn expect_special(value: &WireValue) -> Result<&SpecialWire, ValueError> {
    value.as_special().ok_or_else(|| wrong("special", value))
}

/// Serializes an entity. With `changes_only`, optional properties equal to
/// their shadow are left out; mandatory ones are always written.
pub fn encode(entity: &Entity, changes_only: bool) -> WireObject {
    let layout = entity.layout();
    let update = if changes_only {
        UpdateKind::Delta
    } else {
        UpdateKind::Full
    };
    let mut wire = WireObject::new(entity.kind().wire_name(), entity.id(), update);

    for (index, property) in layout.properties().iter().enumerate() {
        let Some(current) = entity.read(property.field) else {
            continue;
        };
        if changes_only && property.optional {
            let unchanged = entity
                .shadow()
                .get(index)
                .is_some_and(|previous| property.equality.equal(previous, &current));
            if unchanged {
                continue;
            }
        }
        wire.push(property.wire_name, current);
    }
    wire
}

/// Applies every recognized field of `wire` onto `entity`. Unknown keys are
/// ignored; a field with a malformed value is skipped and the rest still
/// applies.
pub fn decode(wire: &WireObject, entity: &mut Entity, initial: bool) -> Result<(), DecodeError> {
    if wire.id != entity.id() {
        return Err(DecodeError::IdMismatch {
            expected: entity.id(),
            found: wire.id,
        });
    }
    let kind = entity.kind();
    if wire.kind != kind.wire_name() {
        return Err(DecodeError::TypeMismatch {
            expected: kind.wire_name(),
            found: wire.kind.clone(),
        });
    }

    let layout = entity.layout();
    for field in &wire.fields {
        let Some((_, property)) = layout.by_wire_name(&field.name) else {
            trace!("{} {}: ignoring unknown field {}", kind.wire_name(), wire.id, field.name);
            continue;
        };
        if let Err(e) = entity.write(property.field, &field.value, initial) {
            warn!(
                "{} {}: skipping field {}: {}",
                kind.wire_name(),
                wire.id,
                field.name,
                e
            );
        }
    }
    Ok(())
}

/// Records the current value of every optional property as last sent.
pub fn refresh_shadow(entity: &mut Entity) {
    let layout = entity.layout();
    let values: Vec<(usize, Option<WireValue>)> = layout
        .properties()
        .iter()
        .enumerate()
        .filter(|(_, p)| p.optional)
        .map(|(index, p)| (index, entity.read(p.field)))
        .collect();
    let shadow = entity.shadow_mut();
    for (index, value) in values {
        shadow.set(index, value);
    }
}

/// True when at least one optional property made it into the object.
pub fn has_optional_fields(wire: &WireObject, layout: &Layout) -> bool {
    wire.field_names().any(|name| layout.is_optional(name))
}
