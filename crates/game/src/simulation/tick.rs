/// Fixed-rate tick driver fed with wall-clock deltas. A long stall is
/// capped at a quarter second so the loop never spirals.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    dt: f32,
    accumulator: f32,
    ticks: u64,
}

impl FixedTimestep {
    pub fn new(tick_rate: u32) -> Self {
        Self {
            dt: 1.0 / tick_rate.max(1) as f32,
            accumulator: 0.0,
            ticks: 0,
        }
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    /// Ticks consumed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn accumulate(&mut self, delta: f32) {
        self.accumulator += delta.min(0.25);
    }

    pub fn consume_tick(&mut self) -> bool {
        if self.accumulator >= self.dt {
            self.accumulator -= self.dt;
            self.ticks += 1;
            true
        } else {
            false
        }
    }
}
