use std::f32::consts::TAU;

use glam::Vec2;
use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::entity::{Asteroid, EntityData, Planet, Repeat, Starfield, WorldBounds};
use crate::world::{World, WorldError};

/// How many asteroids of each size the authority scatters at start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsteroidField {
    pub small: usize,
    pub medium: usize,
    pub large: usize,
}

impl Default for AsteroidField {
    fn default() -> Self {
        Self {
            small: 20,
            medium: 10,
            large: 5,
        }
    }
}

impl AsteroidField {
    pub const EMPTY: AsteroidField = AsteroidField {
        small: 0,
        medium: 0,
        large: 0,
    };

    /// (count, mass, radius) per size class.
    fn classes(&self) -> [(usize, f32, f32); 3] {
        [
            (self.small, 5.0, 5.0),
            (self.medium, 20.0, 20.0),
            (self.large, 50.0, 50.0),
        ]
    }

    pub fn total(&self) -> usize {
        self.small + self.medium + self.large
    }
}

/// Fills a fresh authority world: bounds first, then the asteroid field and
/// optionally the background layers.
pub fn populate(
    world: &mut World,
    bounds: WorldBounds,
    asteroids: &AsteroidField,
    background: bool,
) -> Result<(), WorldError> {
    world.spawn(EntityData::WorldBounds(bounds))?;

    if background {
        for layer in background_layers(world.rng(), &bounds) {
            world.spawn(layer)?;
        }
    }

    for (count, mass, radius) in asteroids.classes() {
        for _ in 0..count {
            let asteroid = scatter_asteroid(world.rng(), &bounds, mass, radius);
            world.spawn(EntityData::Asteroid(asteroid))?;
        }
    }

    info!(
        "world populated: {} asteroids, background {}",
        asteroids.total(),
        if background { "on" } else { "off" }
    );
    Ok(())
}

fn scatter_asteroid<R: Rng>(rng: &mut R, bounds: &WorldBounds, mass: f32, radius: f32) -> Asteroid {
    let angle = rng.random_range(0.0..TAU);
    let reach = bounds.size * 0.5 - Vec2::splat(radius);
    let (min, max) = bounds.inset(radius);
    let position = (bounds.center() + Vec2::from_angle(angle) * reach).clamp(min, max);
    let velocity = Vec2::new(signed_unit(rng), signed_unit(rng)) * (1000.0 / mass);

    let mut asteroid = Asteroid::new(mass, radius);
    asteroid.body.position = position;
    asteroid.body.velocity = velocity;
    asteroid
}

fn background_layers<R: Rng>(rng: &mut R, bounds: &WorldBounds) -> Vec<EntityData> {
    let screen = bounds.size.min(Vec2::new(1920.0, 1080.0));
    let mut layers = vec![
        Starfield {
            position: Vec2::ZERO,
            size: screen,
            depth: 0.999,
            density: jitter(rng, 0.0008, 0.0005),
            repeat: Repeat::Both,
            seed: rng.random(),
            ..Default::default()
        },
        Starfield {
            position: Vec2::new(signed_unit(rng) * 500.0, signed_unit(rng) * 250.0),
            size: bounds.size.min(Vec2::new(1000.0, 500.0)),
            depth: 0.995,
            density: jitter(rng, 0.01, 0.005),
            repeat: Repeat::X,
            starfield_type: "milkyway".to_string(),
            rotation: rng.random_range(0.0..TAU),
            seed: rng.random(),
        },
        Starfield {
            position: Vec2::ZERO,
            size: screen,
            depth: 0.99,
            density: jitter(rng, 0.0002, 0.0005),
            repeat: Repeat::Both,
            seed: rng.random(),
            ..Default::default()
        },
    ];

    for _ in 0..10 {
        layers.push(Starfield {
            position: Vec2::new(
                (rng.random::<f32>() - 0.5) * bounds.size.x,
                (rng.random::<f32>() - 0.5) * bounds.size.y,
            ),
            size: Vec2::new(rng.random_range(200.0..1000.0), rng.random_range(200.0..1000.0)),
            depth: 0.9 + 0.09 * rng.random::<f32>(),
            density: 0.0001,
            repeat: Repeat::None,
            starfield_type: "cluster".to_string(),
            rotation: 0.0,
            seed: rng.random(),
        });
    }

    let mut data: Vec<EntityData> = layers.into_iter().map(EntityData::Starfield).collect();
    data.push(EntityData::Planet(planet(rng, bounds)));
    data
}

fn planet<R: Rng>(rng: &mut R, bounds: &WorldBounds) -> Planet {
    let size = 100.0 + rng.random::<f32>() * 924.0;
    let depth = 0.8 + rng.random::<f32>() * 0.1;
    let spawn = ((bounds.size - Vec2::splat(size)) * depth).max(Vec2::ZERO);
    Planet {
        position: Vec2::new(
            (rng.random::<f32>() - 0.5) * spawn.x,
            (rng.random::<f32>() - 0.5) * spawn.y,
        ),
        size: Vec2::splat(size),
        depth,
        planet_type: format!("planet{}", rng.random_range(1..=6)),
    }
}

fn signed_unit<R: Rng>(rng: &mut R) -> f32 {
    1.0 - 2.0 * rng.random::<f32>()
}

/// `base` moved by up to `spread` either way, never negative.
fn jitter<R: Rng>(rng: &mut R, base: f32, spread: f32) -> f32 {
    (base + signed_unit(rng) * spread).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityKind, Tags};
    use crate::world::Role;

    #[test]
    fn default_field_fills_world() {
        let mut world = World::new(Role::Authority, 11);
        populate(&mut world, WorldBounds::default(), &AsteroidField::default(), true).unwrap();

        let count = |kind| world.iter().filter(|e| e.kind() == kind).count();
        assert_eq!(count(EntityKind::WorldBounds), 1);
        assert_eq!(count(EntityKind::Asteroid), 35);
        assert_eq!(count(EntityKind::Starfield), 13);
        assert_eq!(count(EntityKind::Planet), 1);
    }

    #[test]
    fn asteroids_start_inside_bounds() {
        let mut world = World::new(Role::Authority, 5);
        let bounds = WorldBounds::default();
        populate(&mut world, bounds, &AsteroidField::default(), false).unwrap();

        for entity in world.find_all_with_tag(Tags::ASTEROID) {
            let body = entity.body().unwrap();
            let (min, max) = bounds.inset(body.radius);
            assert!(body.position.cmpge(min).all() && body.position.cmple(max).all());
            assert!(body.velocity.abs().max_element() <= 1000.0 / body.mass);
        }
        assert!(world.find_all_with_tag(Tags::BACKGROUND).next().is_none());
    }

    #[test]
    fn same_seed_same_world() {
        let build = || {
            let mut world = World::new(Role::Authority, 42);
            populate(&mut world, WorldBounds::default(), &AsteroidField::default(), true).unwrap();
            world.iter().map(|e| e.position()).collect::<Vec<_>>()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn empty_field_spawns_only_bounds() {
        let mut world = World::new(Role::Authority, 1);
        populate(&mut world, WorldBounds::default(), &AsteroidField::EMPTY, false).unwrap();
        assert_eq!(world.len(), 1);
        assert!(world.bounds().is_some());
    }
}
