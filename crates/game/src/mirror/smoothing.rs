use glam::Vec2;

use crate::entity::{Body, Entity};
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingConfig {
    /// Lerp progress gained per second of local time.
    pub lerp_rate: f32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self { lerp_rate: 10.0 }
    }
}

/// Where the authority last said a mirror was, and when (in local clock
/// terms) that was true.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Smoothing {
    pub target_position: Vec2,
    pub target_velocity: Vec2,
    pub anchor_ms: u64,
    /// 0 right after an update, 1 once the mirror has caught up.
    pub progress: f32,
    pub no_lerp: bool,
}

impl Smoothing {
    /// Takes the authoritative state just decoded into `body` as the new
    /// target. Unless snapping, the body goes back to `predicted` and is
    /// pulled towards the target over the next ticks.
    pub fn retarget(body: &mut Body, predicted: Vec2, anchor_ms: u64, no_lerp: bool) -> Self {
        let target = Self {
            target_position: body.position,
            target_velocity: body.velocity,
            anchor_ms,
            progress: 0.0,
            no_lerp,
        };
        if !no_lerp {
            body.position = predicted;
        }
        target
    }

    pub fn is_settled(&self) -> bool {
        self.progress >= 1.0
    }

    /// The authoritative position advanced by its velocity to `now_ms`.
    pub fn extrapolated(&self, now_ms: u64) -> Vec2 {
        let elapsed = now_ms.saturating_sub(self.anchor_ms) as f32 / 1000.0;
        self.target_position + self.target_velocity * elapsed
    }

    fn step(&mut self, body: &mut Body, config: &SmoothingConfig, dt: f32, now_ms: u64) {
        if self.is_settled() {
            return;
        }
        if self.no_lerp {
            body.position = self.extrapolated(now_ms);
            self.progress = 1.0;
            self.no_lerp = false;
            return;
        }
        self.progress = (self.progress + config.lerp_rate * dt).min(1.0);
        body.position = body.position.lerp(self.extrapolated(now_ms), self.progress);
    }
}

/// Blends every mirror with a pending target towards it.
pub fn apply_smoothing(world: &mut World, config: &SmoothingConfig, dt: f32, now_ms: u64) {
    for entity in world.iter_mut() {
        smooth_entity(entity, config, dt, now_ms);
    }
}

fn smooth_entity(entity: &mut Entity, config: &SmoothingConfig, dt: f32, now_ms: u64) {
    let Some(mut smoothing) = entity.smoothing else {
        return;
    };
    if let Some(body) = entity.body_mut() {
        smoothing.step(body, config, dt, now_ms);
    }
    entity.smoothing = Some(smoothing);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Asteroid, EntityData};
    use crate::world::Role;

    fn body_at(x: f32, vx: f32) -> Body {
        Body::new(5.0, 5.0)
            .with_position(Vec2::new(x, 0.0))
            .with_velocity(Vec2::new(vx, 0.0))
    }

    #[test]
    fn retarget_keeps_prediction_until_smoothed() {
        let mut body = body_at(100.0, 0.0);
        let s = Smoothing::retarget(&mut body, Vec2::new(90.0, 0.0), 1_000, false);
        assert_eq!(body.position.x, 90.0);
        assert_eq!(s.target_position.x, 100.0);
        assert!(!s.is_settled());
    }

    #[test]
    fn no_lerp_snaps_on_next_step() {
        let mut body = body_at(500.0, 0.0);
        let mut s = Smoothing::retarget(&mut body, Vec2::ZERO, 1_000, true);
        assert_eq!(body.position.x, 500.0);
        s.step(&mut body, &SmoothingConfig::default(), 0.016, 1_000);
        assert_eq!(body.position.x, 500.0);
        assert!(s.is_settled());
    }

    #[test]
    fn converges_within_a_tenth_of_a_second() {
        let mut world = World::new(Role::Mirror, 1);
        let id = world.spawn(EntityData::Asteroid(Asteroid::default())).unwrap();
        {
            let entity = world.get_mut(id).unwrap();
            let body = entity.body_mut().unwrap();
            *body = body_at(100.0, 10.0);
            let s = Smoothing::retarget(body, Vec2::ZERO, 0, false);
            entity.smoothing = Some(s);
        }
        let config = SmoothingConfig::default();
        let mut now = 0;
        for _ in 0..2 {
            now += 50;
            apply_smoothing(&mut world, &config, 0.05, now);
        }
        let entity = world.get(id).unwrap();
        assert!(entity.smoothing.unwrap().is_settled());
        let expected = 100.0 + 10.0 * now as f32 / 1000.0;
        assert!((entity.body().unwrap().position.x - expected).abs() < 1e-3);
    }

    #[test]
    fn extrapolation_uses_anchor() {
        let mut body = body_at(0.0, 100.0);
        let s = Smoothing::retarget(&mut body, Vec2::ZERO, 2_000, false);
        assert_eq!(s.extrapolated(2_500), Vec2::new(50.0, 0.0));
        assert_eq!(s.extrapolated(1_000), Vec2::ZERO);
    }
}
