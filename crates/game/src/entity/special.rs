use glam::Vec2;
use rand::Rng;
use rkyv::{Archive, Deserialize, Serialize};

use super::body::Body;
use super::timer::{Countdown, tick_slot};
use crate::replication::SpecialWire;

pub const DEFAULT_SPECIAL_POWER: f32 = 50.0;

const SHIELD_MAX: f32 = 100.0;
const SHIELD_MIN_TO_ACTIVATE: f32 = 20.0;
const BULLET_IMPACT_ENERGY: f32 = 500.0;
const WARP_JUMP_MS: f32 = 1000.0;
const GRAV_STRENGTH: f32 = 10_000.0;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
    Archive,
    Serialize,
    Deserialize,
)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub enum SpecialKind {
    #[default]
    None,
    Shield,
    Warp,
    Grav,
    Antigrav,
}

impl SpecialKind {
    pub fn name(self) -> &'static str {
        match self {
            SpecialKind::None => "none",
            SpecialKind::Shield => "shield",
            SpecialKind::Warp => "warp",
            SpecialKind::Grav => "grav",
            SpecialKind::Antigrav => "antigrav",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [
            SpecialKind::None,
            SpecialKind::Shield,
            SpecialKind::Warp,
            SpecialKind::Grav,
            SpecialKind::Antigrav,
        ]
        .into_iter()
        .find(|kind| kind.name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Thrust,
    Fire,
    RotateCw,
    RotateCcw,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::Thrust,
        Action::Fire,
        Action::RotateCw,
        Action::RotateCcw,
    ];
}

/// Result of a cancelable hook. Every handler runs, then the aggregate decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Hook {
    #[default]
    Allow,
    Cancel,
}

impl Hook {
    pub fn is_cancel(self) -> bool {
        self == Hook::Cancel
    }

    pub fn and(self, other: Hook) -> Hook {
        if self.is_cancel() || other.is_cancel() {
            Hook::Cancel
        } else {
            Hook::Allow
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpecialEvent {
    Jumped { from: Vec2, to: Vec2 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shield {
    pub on: bool,
    pub status: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Warp {
    pub on: bool,
    pub ready: bool,
    pub jumping: bool,
    charged_ms: f32,
    pending_jump_ms: f32,
    off_timer: Option<Countdown>,
    ready_timer: Option<Countdown>,
    jump_timer: Option<Countdown>,
    pub from: Option<Vec2>,
    pub to: Option<Vec2>,
}

impl Warp {
    fn new() -> Self {
        Self {
            on: false,
            ready: true,
            jumping: false,
            charged_ms: 0.0,
            pending_jump_ms: 0.0,
            off_timer: None,
            ready_timer: None,
            jump_timer: None,
            from: None,
            to: None,
        }
    }

    fn busy(&self) -> bool {
        self.on || self.pending_jump_ms > 0.0
    }

    fn release(&mut self) {
        if self.on {
            self.on = false;
            self.pending_jump_ms = self.charged_ms;
            self.charged_ms = 0.0;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grav {
    pub on: bool,
    pub direction: f32,
    /// Set only where this side swapped the mass in; a mirror leaves it alone.
    real_mass: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpecialState {
    None,
    Shield(Shield),
    Warp(Warp),
    Grav(Grav),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Special {
    kind: SpecialKind,
    power: f32,
    state: SpecialState,
}

impl Default for Special {
    fn default() -> Self {
        Self::new(SpecialKind::None, DEFAULT_SPECIAL_POWER)
    }
}

impl Special {
    pub fn new(kind: SpecialKind, power: f32) -> Self {
        let state = match kind {
            SpecialKind::None => SpecialState::None,
            SpecialKind::Shield => SpecialState::Shield(Shield {
                on: false,
                status: SHIELD_MAX,
            }),
            SpecialKind::Warp => SpecialState::Warp(Warp::new()),
            SpecialKind::Grav | SpecialKind::Antigrav => SpecialState::Grav(Grav {
                on: false,
                direction: if kind == SpecialKind::Antigrav { -1.0 } else { 1.0 },
                real_mass: None,
            }),
        };
        Self {
            kind,
            power: power.clamp(0.0, 100.0),
            state,
        }
    }

    pub fn kind(&self) -> SpecialKind {
        self.kind
    }

    pub fn power(&self) -> f32 {
        self.power
    }

    pub fn state(&self) -> &SpecialState {
        &self.state
    }

    pub fn is_on(&self) -> bool {
        match &self.state {
            SpecialState::None => false,
            SpecialState::Shield(s) => s.on,
            SpecialState::Warp(w) => w.on,
            SpecialState::Grav(g) => g.on,
        }
    }

    pub fn shield_status(&self) -> Option<f32> {
        match &self.state {
            SpecialState::Shield(s) => Some(s.status),
            _ => None,
        }
    }

    /// Veto for a ship control. Only turning something on can be vetoed.
    pub fn allows(&self, action: Action, on: bool) -> Hook {
        if !on {
            return Hook::Allow;
        }
        let veto = match &self.state {
            SpecialState::Shield(s) => s.on && matches!(action, Action::Thrust | Action::Fire),
            SpecialState::Warp(w) => w.busy(),
            _ => false,
        };
        if veto { Hook::Cancel } else { Hook::Allow }
    }

    /// Turns the special on. Returns the controls the ship must release, or
    /// `None` when the special refused to start.
    pub fn activate(&mut self, body: &mut Body) -> Option<&'static [Action]> {
        let power = self.power;
        match &mut self.state {
            SpecialState::None => None,
            SpecialState::Shield(s) => {
                if s.status < SHIELD_MIN_TO_ACTIVATE {
                    return None;
                }
                s.on = true;
                Some(&[Action::Fire, Action::Thrust])
            }
            SpecialState::Warp(w) => {
                if w.on || w.jumping || !w.ready {
                    return None;
                }
                w.on = true;
                w.ready = false;
                w.charged_ms = 0.0;
                w.off_timer = Some(Countdown::new(warp_off_delay_ms(power)));
                w.ready_timer = Some(Countdown::new(warp_ready_delay_ms(power)));
                Some(&Action::ALL)
            }
            SpecialState::Grav(g) => {
                if !g.on {
                    g.on = true;
                    g.real_mass = Some(body.mass);
                    body.mass = power;
                }
                Some(&[])
            }
        }
    }

    pub fn deactivate(&mut self, body: &mut Body) {
        match &mut self.state {
            SpecialState::None => {}
            SpecialState::Shield(s) => s.on = false,
            SpecialState::Warp(w) => w.release(),
            SpecialState::Grav(g) => {
                g.on = false;
                if let Some(mass) = g.real_mass.take() {
                    body.mass = mass;
                }
            }
        }
    }

    /// Signed well strength while a grav special is on.
    pub fn gravity_strength(&self) -> Option<f32> {
        match &self.state {
            SpecialState::Grav(g) if g.on => Some(g.direction * GRAV_STRENGTH * (self.power + 10.0)),
            _ => None,
        }
    }

    /// Spends shield capacity on an impact. A cancel means the hit was absorbed.
    pub fn absorb(&mut self, energy: f32) -> Hook {
        let power = self.power.max(1.0);
        match &mut self.state {
            SpecialState::Shield(s) if s.on => {
                s.status = (s.status - energy.abs() / power).max(0.0);
                Hook::Cancel
            }
            _ => Hook::Allow,
        }
    }

    /// Advances timers and drains. `arena` is the box the ship's centre must
    /// stay within after a warp jump.
    pub fn update<R: Rng>(
        &mut self,
        dt: f32,
        body: &mut Body,
        arena: Option<(Vec2, Vec2)>,
        rng: &mut R,
    ) -> Option<SpecialEvent> {
        let power = self.power;
        match &mut self.state {
            SpecialState::Shield(s) => {
                if s.on {
                    s.status = (s.status - dt * 1900.0 / (26.0 + power * 2.0)).max(0.0);
                    if s.status == 0.0 {
                        s.on = false;
                    }
                } else {
                    s.status = (s.status + dt * 950.0 / (226.0 - power * 2.0)).min(SHIELD_MAX);
                }
                None
            }
            SpecialState::Warp(w) => {
                let dt_ms = dt * 1000.0;
                if w.on {
                    w.charged_ms += dt_ms;
                }
                if tick_slot(&mut w.off_timer, dt_ms) {
                    w.release();
                }
                if tick_slot(&mut w.ready_timer, dt_ms) {
                    w.ready = true;
                }
                if tick_slot(&mut w.jump_timer, dt_ms) {
                    w.jumping = false;
                }
                if w.pending_jump_ms <= 0.0 {
                    return None;
                }

                let from = body.position;
                let mut to = from + body.facing() * w.pending_jump_ms;
                if let Some((min, max)) = arena {
                    let outside = to.x < min.x || to.y < min.y || to.x > max.x || to.y > max.y;
                    if outside {
                        to = Vec2::new(
                            random_between(rng, min.x, max.x),
                            random_between(rng, min.y, max.y),
                        );
                    }
                }
                body.position = to;
                w.pending_jump_ms = 0.0;
                w.jumping = true;
                w.jump_timer = Some(Countdown::new(WARP_JUMP_MS));
                w.from = Some(from);
                w.to = Some(to);
                Some(SpecialEvent::Jumped { from, to })
            }
            SpecialState::None | SpecialState::Grav(_) => None,
        }
    }

    /// Stops everything immediately, used when the owner starts tearing down.
    pub fn halt(&mut self, body: &mut Body) {
        self.deactivate(body);
        if let SpecialState::Warp(w) = &mut self.state {
            w.pending_jump_ms = 0.0;
        }
    }

    pub fn to_wire(&self) -> SpecialWire {
        let mut wire = SpecialWire {
            kind: self.kind,
            power: self.power,
            on: self.is_on(),
            status: 0.0,
            ready: false,
            jumping: false,
            from: None,
            to: None,
        };
        match &self.state {
            SpecialState::Shield(s) => wire.status = s.status,
            SpecialState::Warp(w) => {
                wire.ready = w.ready && !w.jumping;
                wire.jumping = w.jumping;
                wire.from = w.from.map(|v| v.to_array());
                wire.to = w.to.map(|v| v.to_array());
            }
            _ => {}
        }
        wire
    }

    /// Mirrors the authority's special. Mass is replicated on its own, so a
    /// grav toggle here never touches the body.
    pub fn apply_wire(&mut self, wire: &SpecialWire) {
        if wire.kind != self.kind {
            *self = Special::new(wire.kind, wire.power);
        }
        self.power = wire.power;
        match &mut self.state {
            SpecialState::None => {}
            SpecialState::Shield(s) => {
                s.on = wire.on;
                s.status = wire.status;
            }
            SpecialState::Warp(w) => {
                w.on = wire.on;
                w.ready = wire.ready;
                w.jumping = wire.jumping;
                w.from = wire.from.map(Vec2::from_array);
                w.to = wire.to.map(Vec2::from_array);
            }
            SpecialState::Grav(g) => g.on = wire.on,
        }
    }
}

/// Shield drain for an impact: a flat amount for bullets, otherwise the
/// kinetic energy both bodies carry along the contact normal.
pub fn impact_energy(
    bullet: bool,
    normal: Vec2,
    own_velocity: Vec2,
    own_mass: f32,
    other_velocity: Vec2,
    other_mass: f32,
) -> f32 {
    if bullet {
        return BULLET_IMPACT_ENERGY;
    }
    0.5 * other_velocity.dot(normal).abs() * other_mass
        + 0.5 * own_velocity.dot(normal).abs() * own_mass
}

pub fn warp_off_delay_ms(power: f32) -> f32 {
    (0.023 * power + 0.2) * 1000.0
}

pub fn warp_ready_delay_ms(power: f32) -> f32 {
    (0.0002 * power * power - 0.11 * power + 10.0) * 1000.0
}

fn random_between<R: Rng>(rng: &mut R, min: f32, max: f32) -> f32 {
    if max > min {
        rng.random_range(min..max)
    } else {
        min
    }
}
