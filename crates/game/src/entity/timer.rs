/// A one-shot countdown in milliseconds, owned by whatever it times.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Countdown {
    remaining_ms: f32,
}

impl Countdown {
    pub fn new(ms: f32) -> Self {
        Self { remaining_ms: ms }
    }

    pub fn remaining_ms(&self) -> f32 {
        self.remaining_ms.max(0.0)
    }

    pub fn is_done(&self) -> bool {
        self.remaining_ms <= 0.0
    }

    /// Returns true exactly once: on the tick the countdown reaches zero.
    pub fn tick(&mut self, dt_ms: f32) -> bool {
        if self.is_done() {
            return false;
        }
        self.remaining_ms -= dt_ms;
        self.is_done()
    }
}

/// Ticks an optional countdown and clears it once it fires.
pub fn tick_slot(slot: &mut Option<Countdown>, dt_ms: f32) -> bool {
    let fired = slot.as_mut().is_some_and(|c| c.tick(dt_ms));
    if fired {
        *slot = None;
    }
    fired
}
