use glam::Vec2;
use log::{debug, warn};

use crate::entity::{Bullet, EntityData, EntityId, Explosion, SpecialEvent, Tags};
use crate::physics::{CollisionReport, CollisionSystem};
use crate::replication::UpdateKind;
use crate::world::{Role, World};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct StepReport {
    pub collisions: CollisionReport,
    pub bullets_fired: Vec<EntityId>,
    pub explosions: Vec<EntityId>,
    pub warp_jumps: Vec<EntityId>,
    /// Everything removed by this step, children first.
    pub removed: Vec<EntityId>,
}

/// One tick of game rules on top of the collision system. The same step runs
/// on the authority and on mirrors; the world's role decides who owns
/// lifetimes, spawns and destruction.
#[derive(Debug, Default)]
pub struct Simulation {
    collisions: CollisionSystem,
}

impl Simulation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&mut self, world: &mut World, dt: f32) -> StepReport {
        let mut report = StepReport::default();
        let authority = world.role() == Role::Authority;

        update_ships(world, dt, &mut report);
        apply_gravity(world);
        for entity in world.iter_mut() {
            if let Some(body) = entity.body_mut() {
                body.integrate_forces(dt);
            }
        }

        report.collisions = self.collisions.step(world, dt);

        let dt_ms = dt * 1000.0;
        let mut expired = Vec::new();
        let mut volleys = Vec::new();
        for entity in world.iter_mut() {
            let id = entity.id();
            match &mut entity.data {
                EntityData::Bullet(bullet) if authority => {
                    if bullet.tick_life(dt_ms) {
                        expired.push(id);
                    }
                }
                EntityData::Explosion(explosion) => {
                    if explosion.tick_life(dt_ms) {
                        expired.push(id);
                    }
                }
                EntityData::Ship(ship) => {
                    if ship.tick_destroy(dt_ms) {
                        expired.push(id);
                    } else if authority {
                        let shots = ship.tick_gun(dt_ms);
                        if !shots.is_empty() {
                            volleys.push((id, ship.color.clone(), shots));
                        }
                    }
                }
                _ => {}
            }
        }

        for (owner, color, shots) in volleys {
            for shot in shots {
                let bullet = Bullet::new(owner, &color, shot.position, shot.velocity);
                match world.spawn(EntityData::Bullet(bullet)) {
                    Ok(id) => report.bullets_fired.push(id),
                    Err(e) => warn!("ship {} cannot fire: {}", owner, e),
                }
            }
        }

        if authority {
            for &ship in &report.collisions.destroyed_ships {
                world.request_update(ship, UpdateKind::Default);
                let Some((position, color)) = world
                    .get(ship)
                    .and_then(|e| e.as_ship())
                    .map(|s| (s.body.position, s.color.clone()))
                else {
                    continue;
                };
                match world.spawn(EntityData::Explosion(Explosion::new(position, &color))) {
                    Ok(id) => report.explosions.push(id),
                    Err(e) => warn!("no explosion for ship {}: {}", ship, e),
                }
            }
        }

        for id in report.collisions.spent_bullets.iter().chain(&expired) {
            report.removed.extend(world.remove(*id));
        }
        for &id in &report.warp_jumps {
            world.request_update(id, UpdateKind::NoLerp);
        }
        report
    }
}

fn update_ships(world: &mut World, dt: f32, report: &mut StepReport) {
    let bounds = world.bounds();
    for id in world.ids_with_tag(Tags::SHIP) {
        let Some((entity, rng)) = world.get_mut_with_rng(id) else {
            continue;
        };
        let Some(ship) = entity.as_ship_mut() else {
            continue;
        };
        let arena = bounds.map(|b| b.inset(ship.body.radius));
        if let Some(SpecialEvent::Jumped { from, to }) =
            ship.special.update(dt, &mut ship.body, arena, rng)
        {
            debug!("ship {} warped {:?} -> {:?}", id, from, to);
            report.warp_jumps.push(id);
        }
        ship.steer();
    }
}

/// Grav specials pull (or push) every other massive body towards the ship.
fn apply_gravity(world: &mut World) {
    let wells: Vec<(EntityId, Vec2, f32)> = world
        .find_all_with_tag(Tags::SHIP)
        .filter_map(|e| {
            let ship = e.as_ship()?;
            let strength = ship.special.gravity_strength()?;
            Some((e.id(), ship.body.position, strength))
        })
        .collect();
    if wells.is_empty() {
        return;
    }
    for entity in world.iter_mut() {
        if !entity.has_tag(Tags::GAMEBASE) {
            continue;
        }
        let id = entity.id();
        let Some(body) = entity.body_mut() else {
            continue;
        };
        if body.mass <= 0.0 {
            continue;
        }
        for &(well, center, strength) in &wells {
            if well == id {
                continue;
            }
            let offset = center - body.position;
            let distance = offset.length();
            if distance <= f32::EPSILON {
                continue;
            }
            let magnitude = strength * body.mass / distance.powf(1.5);
            body.add_force(offset / distance * magnitude);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Asteroid, Player, Ship, ShipConfig, SpecialKind};
    use crate::world::WorldEvent;

    const DT: f32 = 1.0 / 60.0;

    fn world_with_ship(role: Role, config: ShipConfig) -> (World, EntityId) {
        let mut world = World::new(role, 3);
        let player = world.spawn(EntityData::Player(Player::default())).unwrap();
        let ship = world
            .spawn_child(player, EntityData::Ship(Ship::new(player, &config)))
            .unwrap();
        world.drain_events();
        (world, ship)
    }

    fn ship_mut(world: &mut World, id: EntityId) -> &mut Ship {
        world.get_mut(id).and_then(|e| e.as_ship_mut()).unwrap()
    }

    #[test]
    fn thrust_moves_ship_along_facing() {
        let (mut world, id) = world_with_ship(Role::Authority, ShipConfig::default());
        ship_mut(&mut world, id).thrust(true);
        let mut sim = Simulation::new();
        for _ in 0..30 {
            sim.step(&mut world, DT);
        }
        let body = &ship_mut(&mut world, id).body;
        assert!(body.position.x > 10.0);
        assert!(body.position.y.abs() < 1e-3);
        assert!(body.velocity.length() <= 600.0 + 1e-3);
    }

    #[test]
    fn authority_fires_and_bullets_expire() {
        let (mut world, id) = world_with_ship(Role::Authority, ShipConfig::default());
        ship_mut(&mut world, id).fire(true);
        let mut sim = Simulation::new();
        let first = sim.step(&mut world, DT);
        assert_eq!(first.bullets_fired.len(), 1);
        let bullet = first.bullets_fired[0];
        assert_eq!(world.get(bullet).and_then(|e| e.owner()), Some(id));

        let mut removed = false;
        for _ in 0..40 {
            removed |= sim.step(&mut world, DT).removed.contains(&bullet);
        }
        assert!(removed);
        assert!(!world.contains(bullet));
    }

    #[test]
    fn mirror_never_fires() {
        let (mut world, id) = world_with_ship(Role::Mirror, ShipConfig::default());
        ship_mut(&mut world, id).fire(true);
        let report = Simulation::new().step(&mut world, DT);
        assert!(report.bullets_fired.is_empty());
    }

    #[test]
    fn destroyed_ship_explodes_then_leaves() {
        let (mut world, id) = world_with_ship(Role::Authority, ShipConfig::default());
        let mut rock = Asteroid::new(50.0, 50.0);
        rock.body.position = Vec2::new(85.0, 0.0);
        rock.body.velocity = Vec2::new(-300.0, 0.0);
        world.spawn(EntityData::Asteroid(rock)).unwrap();

        let mut sim = Simulation::new();
        let report = sim.step(&mut world, DT);
        assert_eq!(report.collisions.destroyed_ships, vec![id]);
        assert_eq!(report.explosions.len(), 1);
        let events = world.drain_events();
        assert!(events.contains(&WorldEvent::Changed {
            id,
            update: UpdateKind::Default
        }));

        let mut gone = false;
        for _ in 0..70 {
            gone |= sim.step(&mut world, DT).removed.contains(&id);
        }
        assert!(gone);
        assert!(world.find_all_with_tag(Tags::EXPLOSION).next().is_none());
    }

    #[test]
    fn grav_pulls_asteroids_in() {
        let config = ShipConfig {
            special: SpecialKind::Grav,
            ..Default::default()
        };
        let (mut world, id) = world_with_ship(Role::Authority, config);
        ship_mut(&mut world, id).special(true);
        let mut rock = Asteroid::new(5.0, 5.0);
        rock.body.position = Vec2::new(500.0, 0.0);
        let rock = world.spawn(EntityData::Asteroid(rock)).unwrap();
        Simulation::new().step(&mut world, DT);
        let v = world.get(rock).and_then(|e| e.body()).unwrap().velocity;
        assert!(v.x < 0.0);
    }

    #[test]
    fn warp_jump_requests_snap() {
        let config = ShipConfig {
            special: SpecialKind::Warp,
            ..Default::default()
        };
        let (mut world, id) = world_with_ship(Role::Authority, config);
        ship_mut(&mut world, id).special(true);
        let mut sim = Simulation::new();
        let mut jumped = false;
        for _ in 0..120 {
            jumped |= sim.step(&mut world, DT).warp_jumps.contains(&id);
        }
        assert!(jumped);
        assert!(world.drain_events().contains(&WorldEvent::Changed {
            id,
            update: UpdateKind::NoLerp
        }));
    }
}
