mod contact;
mod resolve;

pub use contact::{Contact, Mover, SEPARATION_EPSILON, elastic_velocity, sweep_bounds, sweep_circles};
pub use resolve::{CollisionReport, CollisionSystem};
