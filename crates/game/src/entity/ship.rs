use std::f32::consts::PI;

use glam::Vec2;
use rkyv::{Archive, Deserialize, Serialize};

use super::body::Body;
use super::id::EntityId;
use super::special::{Action, Hook, Special, SpecialKind, DEFAULT_SPECIAL_POWER};
use super::timer::{Countdown, tick_slot};
use crate::replication::{
    Field, ValueError, WireValue, expect_bool, expect_f32, expect_id, expect_special,
    expect_text,
};

pub const DESTROY_TIME_MS: f32 = 1000.0;
pub const SHIP_MASS: f32 = 10.0;
pub const SHIP_RADIUS: f32 = 32.0;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    serde::Serialize,
    serde::Deserialize,
    Archive,
    Serialize,
    Deserialize,
)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub enum ShipType {
    Deltaship,
    Sweepship,
    #[default]
    Bustership,
}

impl ShipType {
    pub fn name(self) -> &'static str {
        match self {
            ShipType::Deltaship => "deltaship",
            ShipType::Sweepship => "sweepship",
            ShipType::Bustership => "bustership",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [ShipType::Deltaship, ShipType::Sweepship, ShipType::Bustership]
            .into_iter()
            .find(|t| t.name() == name)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    serde::Serialize,
    serde::Deserialize,
    Archive,
    Serialize,
    Deserialize,
)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub enum FireMode {
    #[default]
    Burst,
    Single,
    Double,
    DoubleAlt,
    Shot,
}

/// Cadence of one fire mode: a shot attempt every `interval_ms`, at most
/// `max_shots` attempts inside any `window_ms`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireCadence {
    pub interval_ms: f32,
    pub window_ms: f32,
    pub max_shots: usize,
}

impl FireMode {
    pub fn name(self) -> &'static str {
        match self {
            FireMode::Burst => "burst",
            FireMode::Single => "single",
            FireMode::Double => "double",
            FireMode::DoubleAlt => "doubleAlt",
            FireMode::Shot => "shot",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [
            FireMode::Burst,
            FireMode::Single,
            FireMode::Double,
            FireMode::DoubleAlt,
            FireMode::Shot,
        ]
        .into_iter()
        .find(|m| m.name() == name)
    }

    pub fn cadence(self) -> FireCadence {
        let (interval_ms, window_ms, max_shots) = match self {
            FireMode::Burst => (125.0, 1000.0, 3),
            FireMode::Single => (250.0, 1000.0, 4),
            FireMode::Double => (250.0, 250.0, 1),
            FireMode::DoubleAlt => (500.0, 500.0, 1),
            FireMode::Shot => (1000.0, 1000.0, 1),
        };
        FireCadence {
            interval_ms,
            window_ms,
            max_shots,
        }
    }
}

/// What a peer asks for when spawning a ship.
#[derive(
    Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, Archive, Serialize, Deserialize,
)]
#[rkyv(derive(Debug))]
pub struct ShipConfig {
    pub ship_type: ShipType,
    pub special: SpecialKind,
    pub special_power: f32,
    pub fire_mode: FireMode,
    pub color: String,
    pub bullet_speed: f32,
    pub max_thrust: f32,
    pub max_rotate: f32,
    pub max_speed: f32,
}

impl Default for ShipConfig {
    fn default() -> Self {
        Self {
            ship_type: ShipType::default(),
            special: SpecialKind::None,
            special_power: DEFAULT_SPECIAL_POWER,
            fire_mode: FireMode::default(),
            color: "#F00".to_string(),
            bullet_speed: 500.0,
            max_thrust: 3000.0,
            max_rotate: 0.04,
            max_speed: 600.0,
        }
    }
}

impl ShipConfig {
    /// Replaces non-finite or out-of-range tunables with defaults or limits.
    pub fn sanitized(mut self) -> Self {
        let defaults = ShipConfig::default();
        let fix = |value: f32, fallback: f32, min: f32, max: f32| {
            if value.is_finite() {
                value.clamp(min, max)
            } else {
                fallback
            }
        };
        self.special_power = fix(self.special_power, defaults.special_power, 0.0, 100.0);
        self.bullet_speed = fix(self.bullet_speed, defaults.bullet_speed, 50.0, 2000.0);
        self.max_thrust = fix(self.max_thrust, defaults.max_thrust, 0.0, 10_000.0);
        self.max_rotate = fix(self.max_rotate, defaults.max_rotate, 0.0, 0.2);
        self.max_speed = fix(self.max_speed, defaults.max_speed, 50.0, 2000.0);
        if self.color.is_empty() || self.color.len() > 32 {
            self.color = defaults.color;
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulletSpawn {
    pub position: Vec2,
    pub velocity: Vec2,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Gun {
    triggered: bool,
    cadence: Option<Countdown>,
    records: Vec<Countdown>,
    shots: u32,
}

impl Gun {
    fn stop(&mut self) {
        self.triggered = false;
        self.cadence = None;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ship {
    pub body: Body,
    pub owner: EntityId,
    pub color: String,
    pub ship_type: ShipType,
    pub special: Special,
    pub thrust: f32,
    pub rotate: f32,
    pub firing: bool,
    pub destroying: bool,
    pub bullet_speed: f32,
    pub max_thrust: f32,
    pub max_rotate: f32,
    pub fire_mode: FireMode,
    destroy_timer: Option<Countdown>,
    gun: Gun,
}

impl Ship {
    pub fn new(owner: EntityId, config: &ShipConfig) -> Self {
        let mut body = Body::new(SHIP_RADIUS, SHIP_MASS);
        body.max_speed = config.max_speed;
        Self {
            body,
            owner,
            color: config.color.clone(),
            ship_type: config.ship_type,
            special: Special::new(config.special, config.special_power),
            thrust: 0.0,
            rotate: 0.0,
            firing: false,
            destroying: false,
            bullet_speed: config.bullet_speed,
            max_thrust: config.max_thrust,
            max_rotate: config.max_rotate,
            fire_mode: config.fire_mode,
            destroy_timer: None,
            gun: Gun::default(),
        }
    }

    fn control(&self, action: Action, on: bool) -> Hook {
        if self.destroying && on {
            return Hook::Cancel;
        }
        self.special.allows(action, on)
    }

    pub fn thrust(&mut self, on: bool) -> Hook {
        let hook = self.control(Action::Thrust, on);
        if !hook.is_cancel() {
            self.thrust = if on { self.max_thrust } else { 0.0 };
        }
        hook
    }

    pub fn rotate_cw(&mut self, on: bool) -> Hook {
        let hook = self.control(Action::RotateCw, on);
        if !hook.is_cancel() {
            self.rotate = if on { self.max_rotate } else { 0.0 };
        }
        hook
    }

    pub fn rotate_ccw(&mut self, on: bool) -> Hook {
        let hook = self.control(Action::RotateCcw, on);
        if !hook.is_cancel() {
            self.rotate = if on { -self.max_rotate } else { 0.0 };
        }
        hook
    }

    pub fn fire(&mut self, on: bool) -> Hook {
        let hook = self.control(Action::Fire, on);
        if hook.is_cancel() {
            return hook;
        }
        if on && !self.firing {
            self.gun.triggered = true;
        } else if !on {
            self.gun.stop();
        }
        self.firing = on;
        hook
    }

    pub fn special(&mut self, on: bool) -> Hook {
        if self.destroying && on {
            return Hook::Cancel;
        }
        if on {
            if let Some(released) = self.special.activate(&mut self.body) {
                for action in released {
                    self.release(*action);
                }
            }
        } else {
            self.special.deactivate(&mut self.body);
        }
        Hook::Allow
    }

    fn release(&mut self, action: Action) {
        match action {
            Action::Thrust => self.thrust = 0.0,
            Action::Fire => {
                self.firing = false;
                self.gun.stop();
            }
            Action::RotateCw | Action::RotateCcw => self.rotate = 0.0,
        }
    }

    /// Starts the teardown sequence. Returns false when it was already running.
    pub fn begin_destroy(&mut self) -> bool {
        if self.destroying {
            return false;
        }
        self.destroying = true;
        for action in Action::ALL {
            self.release(action);
        }
        self.special.halt(&mut self.body);
        self.destroy_timer = Some(Countdown::new(DESTROY_TIME_MS));
        true
    }

    /// Applies rotation and thrust for this tick.
    pub fn steer(&mut self) {
        self.body.rotation += self.rotate;
        if self.thrust != 0.0 {
            let force = self.body.facing() * self.thrust;
            self.body.add_force(force);
        }
    }

    /// Returns true on the tick the destroy sequence completes.
    pub fn tick_destroy(&mut self, dt_ms: f32) -> bool {
        tick_slot(&mut self.destroy_timer, dt_ms)
    }

    /// Advances the fire cadence and returns the bullets to spawn this tick.
    pub fn tick_gun(&mut self, dt_ms: f32) -> Vec<BulletSpawn> {
        let cadence = self.fire_mode.cadence();
        self.gun.records.retain_mut(|record| !record.tick(dt_ms));
        if !self.firing || self.destroying {
            return Vec::new();
        }

        let attempt = if self.gun.triggered {
            self.gun.triggered = false;
            self.gun.cadence = Some(Countdown::new(cadence.interval_ms));
            true
        } else if tick_slot(&mut self.gun.cadence, dt_ms) {
            self.gun.cadence = Some(Countdown::new(cadence.interval_ms));
            true
        } else {
            false
        };
        if !attempt || self.gun.records.len() >= cadence.max_shots {
            return Vec::new();
        }
        self.gun.records.push(Countdown::new(cadence.window_ms));
        self.shot_pattern()
    }

    fn shot_pattern(&mut self) -> Vec<BulletSpawn> {
        let r = self.body.radius;
        let nose = Vec2::new(r, 0.0);
        match self.fire_mode {
            FireMode::Burst | FireMode::Single => vec![self.bullet(nose, 0.0)],
            FireMode::Double => {
                let offset = self.alternate_offset();
                vec![self.bullet(offset, 0.0)]
            }
            FireMode::DoubleAlt => (0..2)
                .map(|_| {
                    let offset = self.alternate_offset();
                    self.bullet(offset, 0.0)
                })
                .collect(),
            FireMode::Shot => {
                let spread = PI / 16.0;
                let count = 4;
                let start = spread * (count - 1) as f32 / -2.0;
                (0..count)
                    .map(|i| {
                        self.gun.shots += 1;
                        self.bullet(nose, start + spread * i as f32)
                    })
                    .collect()
            }
        }
    }

    fn alternate_offset(&mut self) -> Vec2 {
        self.gun.shots += 1;
        let side = 1.0 - (self.gun.shots % 2) as f32 * 2.0;
        Vec2::new(self.body.radius * 0.25, side * self.body.radius * 0.75)
    }

    fn bullet(&self, offset: Vec2, angle: f32) -> BulletSpawn {
        let facing = Vec2::from_angle(self.body.rotation);
        BulletSpawn {
            position: self.body.position + facing.rotate(offset),
            velocity: Vec2::from_angle(self.body.rotation + angle) * self.bullet_speed
                + self.body.velocity,
        }
    }

    pub fn read(&self, field: Field) -> Option<WireValue> {
        let value = match field {
            Field::Owner => WireValue::Id(self.owner),
            Field::Color => WireValue::Text(self.color.clone()),
            Field::ShipType => WireValue::Text(self.ship_type.name().to_string()),
            Field::Special => WireValue::Special(self.special.to_wire()),
            Field::Thrust => WireValue::Float(self.thrust),
            Field::Rotate => WireValue::Float(self.rotate),
            Field::Firing => WireValue::Bool(self.firing),
            Field::Destroying => WireValue::Bool(self.destroying),
            Field::BulletSpeed => WireValue::Float(self.bullet_speed),
            Field::MaxThrust => WireValue::Float(self.max_thrust),
            Field::MaxRotate => WireValue::Float(self.max_rotate),
            Field::FireMode => WireValue::Text(self.fire_mode.name().to_string()),
            _ => return self.body.read_field(field),
        };
        Some(value)
    }

    pub fn write(&mut self, field: Field, value: &WireValue) -> Result<(), ValueError> {
        match field {
            Field::Owner => self.owner = expect_id(value)?,
            Field::Color => self.color = expect_text(value)?.to_string(),
            Field::ShipType => {
                let name = expect_text(value)?;
                self.ship_type = ShipType::from_name(name)
                    .ok_or_else(|| ValueError::UnknownVariant(name.to_string()))?;
            }
            Field::Special => self.special.apply_wire(expect_special(value)?),
            Field::Thrust => self.thrust = expect_f32(value)?,
            Field::Rotate => self.rotate = expect_f32(value)?,
            Field::Firing => self.firing = expect_bool(value)?,
            Field::Destroying => {
                if expect_bool(value)? {
                    self.begin_destroy();
                } else {
                    self.destroying = false;
                    self.destroy_timer = None;
                }
            }
            Field::BulletSpeed => self.bullet_speed = expect_f32(value)?,
            Field::MaxThrust => self.max_thrust = expect_f32(value)?,
            Field::MaxRotate => self.max_rotate = expect_f32(value)?,
            Field::FireMode => {
                let name = expect_text(value)?;
                self.fire_mode = FireMode::from_name(name)
                    .ok_or_else(|| ValueError::UnknownVariant(name.to_string()))?;
            }
            _ => self.body.write_field(field, value)?,
        }
        Ok(())
    }
}
