//! Shared rate limit for overflow meta-events.
//!
//! One `OverflowGate` exists per bus.  The main queue and every subscriber
//! queue report their drops into the same gate, so the bus as a whole emits
//! at most one loss report per interval no matter how many queues overflow.

use std::time::Duration;

use tokio::time::Instant;

/// Decision returned for each recorded drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GateDecision {
    /// Emit a meta-event now, reporting this many drops since the last one.
    Emit { dropped: u64 },
    /// Inside the interval: the drop is counted but nothing is emitted.
    Suppress,
}

#[derive(Debug)]
pub(crate) struct OverflowGate {
    min_interval: Duration,
    last_emitted: Option<Instant>,
    dropped_since_last: u64,
    emitted_total: u64,
    suppressed_total: u64,
}

impl OverflowGate {
    pub(crate) fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_emitted: None,
            dropped_since_last: 0,
            emitted_total: 0,
            suppressed_total: 0,
        }
    }

    /// Count one dropped event and decide whether to signal it.
    pub(crate) fn record_drop(&mut self, now: Instant) -> GateDecision {
        self.dropped_since_last = self.dropped_since_last.saturating_add(1);

        let due = match self.last_emitted {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
        };

        if !due {
            self.suppressed_total = self.suppressed_total.saturating_add(1);
            return GateDecision::Suppress;
        }

        let dropped = std::mem::take(&mut self.dropped_since_last);
        self.last_emitted = Some(now);
        self.emitted_total = self.emitted_total.saturating_add(1);
        GateDecision::Emit { dropped }
    }

    pub(crate) fn pending_drops(&self) -> u64 {
        self.dropped_since_last
    }

    pub(crate) fn emitted_total(&self) -> u64 {
        self.emitted_total
    }

    pub(crate) fn suppressed_total(&self) -> u64 {
        self.suppressed_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_drop_emits_immediately() {
        let mut gate = OverflowGate::new(Duration::from_secs(1));
        assert_eq!(gate.record_drop(Instant::now()), GateDecision::Emit { dropped: 1 });
    }

    #[test]
    fn drops_inside_interval_accumulate_into_next_emission() {
        let mut gate = OverflowGate::new(Duration::from_secs(1));
        let start = Instant::now();

        assert_eq!(gate.record_drop(start), GateDecision::Emit { dropped: 1 });
        for ms in [10, 200, 999] {
            assert_eq!(
                gate.record_drop(start + Duration::from_millis(ms)),
                GateDecision::Suppress
            );
        }
        assert_eq!(gate.pending_drops(), 3);

        // The fourth drop lands on the interval boundary and carries the
        // three suppressed ones with it.
        assert_eq!(
            gate.record_drop(start + Duration::from_millis(1000)),
            GateDecision::Emit { dropped: 4 }
        );
        assert_eq!(gate.pending_drops(), 0);
        assert_eq!(gate.emitted_total(), 2);
        assert_eq!(gate.suppressed_total(), 3);
    }
}
