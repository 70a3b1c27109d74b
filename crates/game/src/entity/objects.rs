use glam::Vec2;

use super::body::Body;
use super::id::EntityId;
use super::timer::Countdown;
use crate::replication::{Field, ValueError, WireValue, expect_f32, expect_id, expect_text};

pub const BULLET_LIFETIME_MS: f32 = 500.0;
pub const EXPLOSION_TIMESPAN_MS: f32 = 1000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Bullet {
    pub body: Body,
    pub owner: EntityId,
    pub color: String,
    life: Countdown,
}

impl Bullet {
    pub fn new(owner: EntityId, color: &str, position: Vec2, velocity: Vec2) -> Self {
        Self {
            body: Body::new(3.0, 0.5)
                .with_position(position)
                .with_velocity(velocity),
            owner,
            color: color.to_string(),
            life: Countdown::new(BULLET_LIFETIME_MS),
        }
    }

    /// Returns true on the tick the bullet expires.
    pub fn tick_life(&mut self, dt_ms: f32) -> bool {
        self.life.tick(dt_ms)
    }

    pub fn read(&self, field: Field) -> Option<WireValue> {
        match field {
            Field::Owner => Some(WireValue::Id(self.owner)),
            Field::Color => Some(WireValue::Text(self.color.clone())),
            _ => self.body.read_field(field),
        }
    }

    pub fn write(&mut self, field: Field, value: &WireValue) -> Result<(), ValueError> {
        match field {
            Field::Owner => self.owner = expect_id(value)?,
            Field::Color => self.color = expect_text(value)?.to_string(),
            _ => self.body.write_field(field, value)?,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Asteroid {
    pub body: Body,
    pub color: String,
}

impl Asteroid {
    pub fn new(mass: f32, radius: f32) -> Self {
        Self {
            body: Body::new(radius, mass),
            color: "#888".to_string(),
        }
    }

    pub fn read(&self, field: Field) -> Option<WireValue> {
        match field {
            Field::Color => Some(WireValue::Text(self.color.clone())),
            _ => self.body.read_field(field),
        }
    }

    pub fn write(&mut self, field: Field, value: &WireValue) -> Result<(), ValueError> {
        match field {
            Field::Color => self.color = expect_text(value)?.to_string(),
            _ => self.body.write_field(field, value)?,
        }
        Ok(())
    }
}

impl Default for Asteroid {
    fn default() -> Self {
        Self::new(50.0, 50.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Explosion {
    pub body: Body,
    pub color: String,
    pub explosion_type: String,
    pub timespan: f32,
    life: Countdown,
}

impl Default for Explosion {
    fn default() -> Self {
        Self::new(Vec2::ZERO, "#860")
    }
}

impl Explosion {
    pub fn new(position: Vec2, color: &str) -> Self {
        Self {
            body: Body::new(100.0, 0.0).with_position(position),
            color: color.to_string(),
            explosion_type: "shipexplosion".to_string(),
            timespan: EXPLOSION_TIMESPAN_MS,
            life: Countdown::new(EXPLOSION_TIMESPAN_MS),
        }
    }

    /// Returns true on the tick the explosion has played out.
    pub fn tick_life(&mut self, dt_ms: f32) -> bool {
        self.life.tick(dt_ms)
    }

    pub fn read(&self, field: Field) -> Option<WireValue> {
        match field {
            Field::Color => Some(WireValue::Text(self.color.clone())),
            Field::ExplosionType => Some(WireValue::Text(self.explosion_type.clone())),
            Field::Timespan => Some(WireValue::Float(self.timespan)),
            _ => self.body.read_field(field),
        }
    }

    /// On the initial decode a timespan also restarts the local countdown.
    pub fn write(&mut self, field: Field, value: &WireValue, initial: bool) -> Result<(), ValueError> {
        match field {
            Field::Color => self.color = expect_text(value)?.to_string(),
            Field::ExplosionType => self.explosion_type = expect_text(value)?.to_string(),
            Field::Timespan => {
                self.timespan = expect_f32(value)?;
                if initial {
                    self.life = Countdown::new(self.timespan);
                }
            }
            _ => self.body.write_field(field, value)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bullet_expires_after_lifetime() {
        let mut b = Bullet::new(EntityId(1), "#fff", Vec2::ZERO, Vec2::X);
        assert!(!b.tick_life(400.0));
        assert!(b.tick_life(100.0));
        assert!(!b.tick_life(100.0));
    }

    #[test]
    fn explosion_timespan_resets_only_initially() {
        let mut e = Explosion::default();
        e.write(Field::Timespan, &WireValue::Float(200.0), false).unwrap();
        assert!(!e.tick_life(500.0));
        e.write(Field::Timespan, &WireValue::Float(200.0), true).unwrap();
        assert!(e.tick_life(200.0));
    }

    #[test]
    fn asteroid_rejects_foreign_fields() {
        let mut a = Asteroid::default();
        assert_eq!(
            a.write(Field::Owner, &WireValue::Id(EntityId(1))),
            Err(ValueError::NotCarried(Field::Owner))
        );
    }
}
