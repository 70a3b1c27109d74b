use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockConfig {
    pub echo_interval_ms: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            echo_interval_ms: 5000,
        }
    }
}

/// Round-trip estimate from periodic echoes. The latest sample replaces the
/// previous one outright.
#[derive(Debug, Clone)]
pub struct ClockEstimator {
    config: ClockConfig,
    last_echo_ms: Option<u64>,
    rtt_ms: Option<u64>,
    drift_ms: u64,
}

impl ClockEstimator {
    pub fn new(config: ClockConfig) -> Self {
        Self {
            config,
            last_echo_ms: None,
            rtt_ms: None,
            drift_ms: 0,
        }
    }

    /// Returns the timestamp to echo when one is due. The first poll is
    /// always due.
    pub fn poll(&mut self, now_ms: u64) -> Option<u64> {
        let due = self
            .last_echo_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.config.echo_interval_ms);
        if !due {
            return None;
        }
        self.last_echo_ms = Some(now_ms);
        Some(now_ms)
    }

    /// Records an echo reply carrying the timestamp it was sent with.
    pub fn observe(&mut self, echoed_ms: u64, now_ms: u64) -> u64 {
        let rtt = now_ms.saturating_sub(echoed_ms);
        self.rtt_ms = Some(rtt);
        self.drift_ms = rtt / 2;
        debug!("echo: rtt {} ms, drift {} ms", rtt, self.drift_ms);
        rtt
    }

    /// `None` until the first reply arrives.
    pub fn rtt(&self) -> Option<u64> {
        self.rtt_ms
    }

    pub fn drift(&self) -> u64 {
        self.drift_ms
    }
}

impl Default for ClockEstimator {
    fn default() -> Self {
        Self::new(ClockConfig::default())
    }
}
