use glam::Vec2;

use crate::replication::{Field, ValueError, WireValue, expect_bool, expect_f32, expect_vec2};

pub const DEFAULT_MIN_SPEED: f32 = 0.1;

/// Circular rigid body shared by every physical entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub position: Vec2,
    pub velocity: Vec2,
    pub total_force: Vec2,
    pub rotation: f32,
    pub radius: f32,
    /// Zero mass means immovable: forces are ignored.
    pub mass: f32,
    pub elasticity: f32,
    pub min_speed: f32,
    pub max_speed: f32,
    pub can_collide: bool,
}

impl Default for Body {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            total_force: Vec2::ZERO,
            rotation: 0.0,
            radius: 1.0,
            mass: 1.0,
            elasticity: 1.0,
            min_speed: DEFAULT_MIN_SPEED,
            max_speed: f32::INFINITY,
            can_collide: true,
        }
    }
}

impl Body {
    pub fn new(radius: f32, mass: f32) -> Self {
        Self {
            radius,
            mass,
            ..Default::default()
        }
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn add_force(&mut self, force: Vec2) {
        self.total_force += force;
    }

    pub fn facing(&self) -> Vec2 {
        Vec2::from_angle(self.rotation)
    }

    /// Converts the accumulated force into velocity and clears the accumulator.
    pub fn integrate_forces(&mut self, dt: f32) {
        if self.mass > 0.0 {
            self.velocity += self.total_force * (dt / self.mass);
        }
        self.total_force = Vec2::ZERO;
        self.clamp_speed();
    }

    pub fn clamp_speed(&mut self) {
        let speed_sq = self.velocity.length_squared();
        if speed_sq <= self.min_speed * self.min_speed {
            self.velocity = Vec2::ZERO;
        } else if speed_sq > self.max_speed * self.max_speed {
            self.velocity = self.velocity.normalize() * self.max_speed;
        }
    }

    pub fn advance(&mut self, dt: f32) {
        self.position += self.velocity * dt;
    }

    pub fn momentum(&self) -> Vec2 {
        self.velocity * self.mass
    }

    pub fn kinetic_energy(&self) -> f32 {
        0.5 * self.mass * self.velocity.length_squared()
    }

    pub fn read_field(&self, field: Field) -> Option<WireValue> {
        let value = match field {
            Field::Position => WireValue::vec2(self.position),
            Field::Velocity => WireValue::vec2(self.velocity),
            Field::Rotation => WireValue::Float(self.rotation),
            Field::Radius => WireValue::Float(self.radius),
            Field::Mass => WireValue::Float(self.mass),
            Field::Elasticity => WireValue::Float(self.elasticity),
            Field::MinSpeed => WireValue::Float(self.min_speed),
            Field::MaxSpeed => WireValue::Float(self.max_speed),
            Field::CanCollide => WireValue::Bool(self.can_collide),
            _ => return None,
        };
        Some(value)
    }

    pub fn write_field(&mut self, field: Field, value: &WireValue) -> Result<(), ValueError> {
        match field {
            Field::Position => self.position = expect_vec2(value)?,
            Field::Velocity => self.velocity = expect_vec2(value)?,
            Field::Rotation => self.rotation = expect_f32(value)?,
            Field::Radius => self.radius = expect_f32(value)?,
            Field::Mass => self.mass = expect_f32(value)?,
            Field::Elasticity => self.elasticity = expect_f32(value)?,
            Field::MinSpeed => self.min_speed = expect_f32(value)?,
            Field::MaxSpeed => self.max_speed = expect_f32(value)?,
            Field::CanCollide => self.can_collide = expect_bool(value)?,
            _ => return Err(ValueError::NotCarried(field)),
        }
        Ok(())
    }
}
