use glam::Vec2;

use crate::replication::{Field, ValueError, WireValue, expect_vec2};

/// Axis-aligned playfield box. Everything collidable is kept inside it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub position: Vec2,
    pub size: Vec2,
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            position: Vec2::new(-2000.0, -1000.0),
            size: Vec2::new(4000.0, 2000.0),
        }
    }
}

impl WorldBounds {
    pub fn new(position: Vec2, size: Vec2) -> Self {
        Self { position, size }
    }

    pub fn min(&self) -> Vec2 {
        self.position
    }

    pub fn max(&self) -> Vec2 {
        self.position + self.size
    }

    pub fn center(&self) -> Vec2 {
        self.position + self.size * 0.5
    }

    /// The box shrunk by `margin` on every side, collapsed to its centre when
    /// the margin is larger than half the box.
    pub fn inset(&self, margin: f32) -> (Vec2, Vec2) {
        let min = self.min() + Vec2::splat(margin);
        let max = self.max() - Vec2::splat(margin);
        let center = self.center();
        (min.min(center), max.max(center))
    }

    pub fn contains(&self, point: Vec2) -> bool {
        let (min, max) = (self.min(), self.max());
        point.x >= min.x && point.y >= min.y && point.x <= max.x && point.y <= max.y
    }

    pub fn read(&self, field: Field) -> Option<WireValue> {
        match field {
            Field::Position => Some(WireValue::vec2(self.position)),
            Field::Size => Some(WireValue::vec2(self.size)),
            _ => None,
        }
    }

    pub fn write(&mut self, field: Field, value: &WireValue) -> Result<(), ValueError> {
        match field {
            Field::Position => self.position = expect_vec2(value)?,
            Field::Size => self.size = expect_vec2(value)?,
            _ => return Err(ValueError::NotCarried(field)),
        }
        Ok(())
    }
}
