use std::collections::VecDeque;

use super::protocol::sequence_greater_than;

const RECENT_WINDOW: usize = 128;

/// Remembers recently seen sequence numbers of one sender so duplicated
/// datagrams are dropped before they reach the session.
#[derive(Debug)]
pub struct ReceiveTracker {
    last_received: Option<u32>,
    recent_sequences: VecDeque<u32>,
}

impl Default for ReceiveTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveTracker {
    pub fn new() -> Self {
        Self {
            last_received: None,
            recent_sequences: VecDeque::with_capacity(RECENT_WINDOW),
        }
    }

    /// Returns false for a sequence already seen.
    pub fn record_received(&mut self, sequence: u32) -> bool {
        if self.recent_sequences.contains(&sequence) {
            return false;
        }

        if self.recent_sequences.len() >= RECENT_WINDOW {
            self.recent_sequences.pop_front();
        }
        self.recent_sequences.push_back(sequence);

        if self
            .last_received
            .is_none_or(|last| sequence_greater_than(sequence, last))
        {
            self.last_received = Some(sequence);
        }
        true
    }

    pub fn last_received(&self) -> Option<u32> {
        self.last_received
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_detection() {
        let mut tracker = ReceiveTracker::new();

        assert!(tracker.record_received(1));
        assert!(!tracker.record_received(1));
        assert!(tracker.record_received(2));
    }

    #[test]
    fn test_out_of_order_keeps_newest() {
        let mut tracker = ReceiveTracker::new();

        tracker.record_received(3);
        tracker.record_received(1);
        tracker.record_received(2);

        assert_eq!(tracker.last_received(), Some(3));
        assert!(!tracker.record_received(2));
    }

    #[test]
    fn test_window_forgets_old_sequences() {
        let mut tracker = ReceiveTracker::new();
        for sequence in 0..=RECENT_WINDOW as u32 {
            tracker.record_received(sequence);
        }
        assert!(tracker.record_received(0));
    }
}
