use glam::Vec2;

/// Pushes separated circles apart by at least this much.
pub const SEPARATION_EPSILON: f32 = f32::EPSILON;

/// Start-of-tick state of one circle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mover {
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
}

/// One side's view of a narrow-phase contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Where this body's centre was at the moment of contact.
    pub position: Vec2,
    /// Unit vector pointing from the other body towards this one.
    pub normal: Vec2,
    /// This body's velocity going into the contact.
    pub velocity: Vec2,
    /// Seconds of the tick left after the contact.
    pub time_left: f32,
    pub radius: f32,
    /// Overlap depth when the bodies already intersected at tick start.
    pub penetration: f32,
    pub canceled: bool,
}

/// Earliest time within `dt` at which two moving circles touch. Circles that
/// already overlap touch at zero.
pub fn sweep_circles(a: &Mover, b: &Mover, dt: f32) -> Option<(f32, Contact, Contact)> {
    let reach = a.radius + b.radius;
    let offset = a.position - b.position;
    let relative = a.velocity - b.velocity;

    let (time, penetration) = if offset.length_squared() < reach * reach {
        (0.0, reach - offset.length())
    } else {
        let qa = relative.length_squared();
        if qa <= f32::EPSILON {
            return None;
        }
        let qb = 2.0 * offset.dot(relative);
        let qc = offset.length_squared() - reach * reach;
        let disc = qb * qb - 4.0 * qa * qc;
        if disc < 0.0 {
            return None;
        }
        let t = (-qb - disc.sqrt()) / (2.0 * qa);
        if !(0.0..=dt).contains(&t) {
            return None;
        }
        (t, 0.0)
    };

    let at_a = a.position + a.velocity * time;
    let at_b = b.position + b.velocity * time;
    let normal = (at_a - at_b).normalize_or(Vec2::X);
    let side = |m: &Mover, position: Vec2, normal: Vec2| Contact {
        position,
        normal,
        velocity: m.velocity,
        time_left: dt - time,
        radius: m.radius,
        penetration,
        canceled: false,
    };
    Some((time, side(a, at_a, normal), side(b, at_b, -normal)))
}

/// Earliest time within `dt` at which a circle moving inside the box
/// `[min, max]` reaches a wall. The normal points back into the box.
pub fn sweep_bounds(m: &Mover, min: Vec2, max: Vec2, dt: f32) -> Option<(f32, Contact)> {
    let lo = min + Vec2::splat(m.radius);
    let hi = max - Vec2::splat(m.radius);
    let mut best: Option<(f32, Vec2)> = None;

    for axis in 0..2 {
        let p = m.position[axis];
        let v = m.velocity[axis];
        let (time, inward) = if p < lo[axis] {
            (0.0, 1.0)
        } else if p > hi[axis] {
            (0.0, -1.0)
        } else if v > 0.0 {
            ((hi[axis] - p) / v, -1.0)
        } else if v < 0.0 {
            ((lo[axis] - p) / v, 1.0)
        } else {
            continue;
        };
        if time > dt {
            continue;
        }
        let mut normal = Vec2::ZERO;
        normal[axis] = inward;
        if best.is_none_or(|(t, _)| time < t) {
            best = Some((time, normal));
        }
    }

    best.map(|(time, normal)| {
        let position = m.position + m.velocity * time;
        let penetration = (lo - position).max(position - hi).max(Vec2::ZERO).max_element();
        (
            time,
            Contact {
                position,
                normal,
                velocity: m.velocity,
                time_left: dt - time,
                radius: m.radius,
                penetration,
                canceled: false,
            },
        )
    })
}

/// Outgoing velocity of a body after an elastic contact along `normal`.
/// `other` is the other body's velocity and mass, `None` for something
/// immovable. Separating bodies keep their velocity.
pub fn elastic_velocity(
    velocity: Vec2,
    mass: f32,
    other: Option<(Vec2, f32)>,
    normal: Vec2,
    elasticity: f32,
) -> Vec2 {
    let other_velocity = other.map_or(Vec2::ZERO, |(v, _)| v);
    let approach = (velocity - other_velocity).dot(normal);
    if approach >= 0.0 {
        return velocity;
    }
    let share = match other {
        Some((_, other_mass)) if other_mass > 0.0 => {
            if mass <= 0.0 {
                return velocity;
            }
            other_mass / (mass + other_mass)
        }
        _ => 1.0,
    };
    velocity - normal * (share * (1.0 + elasticity) * approach)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mover(x: f32, vx: f32, r: f32) -> Mover {
        Mover {
            position: Vec2::new(x, 0.0),
            velocity: Vec2::new(vx, 0.0),
            radius: r,
        }
    }

    #[test]
    fn head_on_sweep_finds_contact_time() {
        let (t, a, b) = sweep_circles(&mover(0.0, 10.0, 1.0), &mover(10.0, -10.0, 1.0), 1.0).unwrap();
        assert!((t - 0.4).abs() < 1e-5);
        assert_eq!(a.normal, Vec2::new(-1.0, 0.0));
        assert_eq!(b.normal, Vec2::new(1.0, 0.0));
        assert!((a.time_left - 0.6).abs() < 1e-5);
        assert!((a.position.x - 4.0).abs() < 1e-4);
    }

    #[test]
    fn missing_circles_do_not_touch() {
        let a = Mover {
            position: Vec2::new(0.0, 5.0),
            velocity: Vec2::new(10.0, 0.0),
            radius: 1.0,
        };
        assert!(sweep_circles(&a, &mover(5.0, 0.0, 1.0), 1.0).is_none());
        assert!(sweep_circles(&mover(0.0, 1.0, 1.0), &mover(10.0, 0.0, 1.0), 1.0).is_none());
    }

    #[test]
    fn overlap_touches_immediately() {
        let (t, a, _) = sweep_circles(&mover(0.0, 0.0, 2.0), &mover(3.0, 0.0, 2.0), 1.0).unwrap();
        assert_eq!(t, 0.0);
        assert!((a.penetration - 1.0).abs() < 1e-6);
    }

    #[test]
    fn wall_sweep_points_inward() {
        let m = mover(90.0, 100.0, 5.0);
        let (t, c) = sweep_bounds(&m, Vec2::splat(-100.0), Vec2::splat(100.0), 1.0).unwrap();
        assert!((t - 0.05).abs() < 1e-5);
        assert_eq!(c.normal, Vec2::new(-1.0, 0.0));
        assert!(sweep_bounds(&mover(0.0, 1.0, 5.0), Vec2::splat(-100.0), Vec2::splat(100.0), 1.0).is_none());
    }

    #[test]
    fn equal_masses_exchange_velocity() {
        let n = Vec2::new(-1.0, 0.0);
        let va = elastic_velocity(Vec2::X, 1.0, Some((-Vec2::X, 1.0)), n, 1.0);
        let vb = elastic_velocity(-Vec2::X, 1.0, Some((Vec2::X, 1.0)), -n, 1.0);
        assert!((va - (-Vec2::X)).length() < 1e-6);
        assert!((vb - Vec2::X).length() < 1e-6);
    }

    #[test]
    fn immovable_reflects() {
        let v = elastic_velocity(Vec2::new(3.0, 4.0), 1.0, None, Vec2::new(-1.0, 0.0), 1.0);
        assert_eq!(v, Vec2::new(-3.0, 4.0));
        let separating = elastic_velocity(Vec2::new(-3.0, 0.0), 1.0, None, Vec2::new(-1.0, 0.0), 1.0);
        assert_eq!(separating, Vec2::new(-3.0, 0.0));
    }
}
