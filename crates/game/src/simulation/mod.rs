mod populate;
mod step;
mod tick;

pub use populate::{AsteroidField, populate};
pub use step::{Simulation, StepReport};
pub use tick::FixedTimestep;
