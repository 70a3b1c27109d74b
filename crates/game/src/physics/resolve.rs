use std::collections::HashSet;

use glam::Vec2;
use log::debug;

use super::contact::{Contact, Mover, SEPARATION_EPSILON, elastic_velocity, sweep_bounds, sweep_circles};
use crate::entity::{EntityId, EntityKind, Hook, Tags, impact_energy};
use crate::world::{Role, World};

/// What one side of a contact sees of the other.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Participant {
    id: EntityId,
    kind: EntityKind,
    owner: Option<EntityId>,
    position: Vec2,
    velocity: Vec2,
    radius: f32,
    mass: f32,
    elasticity: f32,
}

impl Participant {
    fn mover(&self) -> Mover {
        Mover {
            position: self.position,
            velocity: self.velocity,
            radius: self.radius,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hit {
    None,
    Consume,
    Destroy,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CollisionReport {
    pub contacts: usize,
    /// Bullets that struck something and must be removed.
    pub spent_bullets: Vec<EntityId>,
    /// Ships whose destroy sequence started this tick.
    pub destroyed_ships: Vec<EntityId>,
    /// Shielded ships that absorbed a hit, with the energy absorbed.
    pub absorbed: Vec<(EntityId, f32)>,
}

/// Bounce veto. `None` is the world boundary.
fn on_collision(this: &Participant, other: Option<&Participant>) -> Hook {
    let Some(other) = other else {
        return Hook::Allow;
    };
    let cancel = match this.kind {
        // bullets only ever bounce off the world boundary
        EntityKind::Bullet => true,
        EntityKind::Ship => other.kind == EntityKind::Bullet && other.owner == Some(this.id),
        EntityKind::Asteroid => other.kind == EntityKind::Asteroid,
        _ => false,
    };
    if cancel { Hook::Cancel } else { Hook::Allow }
}

/// Destructive intent of `this` towards itself when first touching `other`.
fn on_hit(this: &Participant, other: &Participant) -> Hit {
    match this.kind {
        EntityKind::Bullet => {
            let ignore = Some(other.id) == this.owner || other.kind == EntityKind::Bullet;
            if ignore { Hit::None } else { Hit::Consume }
        }
        EntityKind::Ship => {
            let own_bullet = other.kind == EntityKind::Bullet && other.owner == Some(this.id);
            if own_bullet { Hit::None } else { Hit::Destroy }
        }
        _ => Hit::None,
    }
}

fn pair_key(a: EntityId, b: EntityId) -> (EntityId, EntityId) {
    if a < b { (a, b) } else { (b, a) }
}

enum Candidate {
    Pair(usize, usize, Contact, Contact),
    Wall(usize, Contact),
}

/// Continuous circle collision with bounce, hit and push-out phases.
/// Remembers which pairs touched last tick so a hit fires only on first
/// contact.
#[derive(Debug, Default)]
pub struct CollisionSystem {
    touching: HashSet<(EntityId, EntityId)>,
}

impl CollisionSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves every body in the world through `dt`, resolving contacts between
    /// collidable bodies and against the world boundary.
    pub fn step(&mut self, world: &mut World, dt: f32) -> CollisionReport {
        let role = world.role();
        let bounds = world.bounds().map(|b| (b.min(), b.max()));
        let bodies: Vec<Participant> = world
            .find_all_with_tag(Tags::COLLIDABLE)
            .filter(|e| !e.is_destroying())
            .filter_map(|e| {
                let body = e.body()?;
                body.can_collide.then(|| Participant {
                    id: e.id(),
                    kind: e.kind(),
                    owner: e.owner(),
                    position: body.position,
                    velocity: body.velocity,
                    radius: body.radius,
                    mass: body.mass,
                    elasticity: body.elasticity,
                })
            })
            .collect();

        let mut candidates: Vec<(f32, Candidate)> = Vec::new();
        for (i, a) in bodies.iter().enumerate() {
            for (j, b) in bodies.iter().enumerate().skip(i + 1) {
                if let Some((t, ca, cb)) = sweep_circles(&a.mover(), &b.mover(), dt) {
                    candidates.push((t, Candidate::Pair(i, j, ca, cb)));
                }
            }
            if let Some((min, max)) = bounds {
                if let Some((t, c)) = sweep_bounds(&a.mover(), min, max, dt) {
                    candidates.push((t, Candidate::Wall(i, c)));
                }
            }
        }
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut report = CollisionReport::default();
        let mut resolved: Vec<Option<(Vec2, Vec2)>> = vec![None; bodies.len()];
        let mut removed: HashSet<EntityId> = HashSet::new();
        let mut touching = HashSet::new();

        for (_, candidate) in candidates {
            match candidate {
                Candidate::Wall(i, mut contact) => {
                    let this = &bodies[i];
                    if resolved[i].is_some() || removed.contains(&this.id) {
                        continue;
                    }
                    report.contacts += 1;
                    contact.canceled = on_collision(this, None).is_cancel();
                    if contact.canceled {
                        continue;
                    }
                    if role == Role::Authority {
                        absorb_wall(world, this, &contact, &mut report);
                    }
                    let velocity =
                        elastic_velocity(contact.velocity, this.mass, None, contact.normal, this.elasticity);
                    let mut position = contact.position + velocity * contact.time_left;
                    if let Some((min, max)) = bounds {
                        let (lo, hi) = (min + Vec2::splat(this.radius), max - Vec2::splat(this.radius));
                        position = position.clamp(lo.min(hi), hi.max(lo));
                    }
                    resolved[i] = Some((position, velocity));
                }
                Candidate::Pair(i, j, mut ca, mut cb) => {
                    let (a, b) = (&bodies[i], &bodies[j]);
                    let key = pair_key(a.id, b.id);
                    let skipped = resolved[i].is_some()
                        || resolved[j].is_some()
                        || removed.contains(&a.id)
                        || removed.contains(&b.id);
                    if skipped {
                        // still in contact, so the first-touch hit stays spent
                        if self.touching.contains(&key) {
                            touching.insert(key);
                        }
                        continue;
                    }
                    report.contacts += 1;
                    touching.insert(key);

                    // every handler runs before any response is applied
                    ca.canceled = on_collision(a, Some(b)).is_cancel();
                    cb.canceled = on_collision(b, Some(a)).is_cancel();

                    let mut next_a = (a.position + a.velocity * dt, a.velocity);
                    let mut next_b = (b.position + b.velocity * dt, b.velocity);
                    let elasticity = a.elasticity * b.elasticity;
                    if !ca.canceled {
                        let v = elastic_velocity(ca.velocity, a.mass, Some((cb.velocity, b.mass)), ca.normal, elasticity);
                        next_a = (ca.position + v * ca.time_left, v);
                    }
                    if !cb.canceled {
                        let v = elastic_velocity(cb.velocity, b.mass, Some((ca.velocity, a.mass)), cb.normal, elasticity);
                        next_b = (cb.position + v * cb.time_left, v);
                    }

                    let (mut hit_a, mut hit_b) = (false, false);
                    if !self.touching.contains(&key) {
                        hit_a = apply_hit(world, role, a, b, &ca, &mut report, &mut removed);
                        hit_b = apply_hit(world, role, b, a, &cb, &mut report, &mut removed);
                    }

                    let a_collidable = !removed.contains(&a.id);
                    let b_collidable = !removed.contains(&b.id);
                    if !ca.canceled && !cb.canceled {
                        if !hit_a && b_collidable {
                            next_a.0 = push_out(next_a.0, a.radius, next_b.0, b.radius);
                        }
                        if !hit_b && a_collidable {
                            next_b.0 = push_out(next_b.0, b.radius, next_a.0, a.radius);
                        }
                    }
                    if !ca.canceled {
                        resolved[i] = Some(next_a);
                    }
                    if !cb.canceled {
                        resolved[j] = Some(next_b);
                    }
                }
            }
        }
        self.touching = touching;

        let mut moved = HashSet::new();
        for (participant, outcome) in bodies.iter().zip(resolved) {
            if let Some((position, velocity)) = outcome {
                if let Some(body) = world.get_mut(participant.id).and_then(|e| e.body_mut()) {
                    body.position = position;
                    body.velocity = velocity;
                    moved.insert(participant.id);
                }
            }
        }
        for entity in world.iter_mut() {
            if moved.contains(&entity.id()) {
                continue;
            }
            if let Some(body) = entity.body_mut() {
                body.advance(dt);
            }
        }
        report
    }
}

/// Runs the hit layer for one side. Returns true when the contact was
/// destructive for `this`.
fn apply_hit(
    world: &mut World,
    role: Role,
    this: &Participant,
    other: &Participant,
    contact: &Contact,
    report: &mut CollisionReport,
    removed: &mut HashSet<EntityId>,
) -> bool {
    match on_hit(this, other) {
        Hit::None => false,
        Hit::Consume => {
            removed.insert(this.id);
            report.spent_bullets.push(this.id);
            true
        }
        Hit::Destroy => {
            if role == Role::Mirror {
                return false;
            }
            let Some(ship) = world.get_mut(this.id).and_then(|e| e.as_ship_mut()) else {
                return false;
            };
            let energy = impact_energy(
                other.kind == EntityKind::Bullet,
                contact.normal,
                this.velocity,
                this.mass,
                other.velocity,
                other.mass,
            );
            if ship.special.absorb(energy).is_cancel() {
                debug!("ship {} absorbed {:.1} from {}", this.id, energy, other.id);
                report.absorbed.push((this.id, energy));
                return false;
            }
            if ship.begin_destroy() {
                debug!("ship {} destroyed by {} {}", this.id, other.kind.wire_name(), other.id);
                report.destroyed_ships.push(this.id);
            }
            true
        }
    }
}

/// A shielded ship hitting the boundary pays for the bounce with shield.
fn absorb_wall(world: &mut World, this: &Participant, contact: &Contact, report: &mut CollisionReport) {
    if this.kind != EntityKind::Ship {
        return;
    }
    let Some(ship) = world.get_mut(this.id).and_then(|e| e.as_ship_mut()) else {
        return;
    };
    let energy = 0.5 * contact.velocity.dot(contact.normal).abs() * this.mass;
    if ship.special.absorb(energy).is_cancel() {
        report.absorbed.push((this.id, energy));
    }
}

/// Moves `position` out of the other circle along the separation vector.
fn push_out(position: Vec2, radius: f32, other: Vec2, other_radius: f32) -> Vec2 {
    let min_dist = radius + other_radius + SEPARATION_EPSILON;
    let offset = position - other;
    if offset.length_squared() > min_dist * min_dist {
        return position;
    }
    let amount = min_dist - offset.length();
    position + offset.normalize_or(Vec2::X) * amount
}
