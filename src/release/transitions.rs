// SRF Engine - Transition Log
//
// Bounded in-memory log of arm-state transitions, stamped with simulation
// time, for post-hoc inspection of why an instance fired (or did not).

/// A single timestamped transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Simulation time (ms).
    pub time_ms: f64,
    pub kind: TransitionKind,
}

/// The different kinds of transitions.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionKind {
    /// Probability gate evaluated at arming time.
    Evaluated {
        ca_sr: f64,
        probability: f64,
        passed: bool,
    },
    /// Event parameters sampled.
    Sampled {
        duration: f64,
        peak: f64,
        long: bool,
    },
    /// Proxy signal first crossed the activity threshold.
    Initiated,
    /// Event retired; `initiated` is false if its window closed silently.
    Retired { initiated: bool },
    /// Excitation cancelled a running event.
    Cancelled,
    /// SR calcium drifted far enough to re-arm from a wait state.
    Rearmed { ca_sr: f64 },
}

/// Append-only transition log.
///
/// Disabled logs record nothing. When `max_events` is reached the oldest
/// half is discarded.
#[derive(Debug, Clone)]
pub struct TransitionLog {
    events: Vec<Transition>,
    max_events: usize,
    enabled: bool,
}

impl TransitionLog {
    /// Create a new log with the given capacity.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Vec::with_capacity(max_events.min(1024)),
            max_events: max_events.max(1),
            enabled: true,
        }
    }

    /// Create a disabled log (no-op recording).
    pub fn disabled() -> Self {
        Self {
            events: Vec::new(),
            max_events: 0,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record(&mut self, time_ms: f64, kind: TransitionKind) {
        if !self.enabled {
            return;
        }
        if self.events.len() >= self.max_events {
            let half = (self.max_events / 2).max(1);
            self.events.drain(..half.min(self.events.len()));
        }
        self.events.push(Transition { time_ms, kind });
    }

    /// All transitions in chronological order.
    pub fn events(&self) -> &[Transition] {
        &self.events
    }

    /// Transitions at or after `time_ms`.
    pub fn since(&self, time_ms: f64) -> Vec<&Transition> {
        self.events.iter().filter(|e| e.time_ms >= time_ms).collect()
    }

    /// Number of events that initiated.
    pub fn initiated_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.kind == TransitionKind::Initiated)
            .count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Default for TransitionLog {
    fn default() -> Self {
        Self::disabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_filter_by_time() {
        let mut log = TransitionLog::new(100);
        log.record(
            0.0,
            TransitionKind::Evaluated {
                ca_sr: 1.0,
                probability: 0.8,
                passed: true,
            },
        );
        log.record(480.0, TransitionKind::Initiated);
        log.record(760.0, TransitionKind::Retired { initiated: true });

        assert_eq!(log.len(), 3);
        assert_eq!(log.since(400.0).len(), 2);
        assert_eq!(log.initiated_count(), 1);
    }

    #[test]
    fn max_events_evicts_oldest() {
        let mut log = TransitionLog::new(10);
        for i in 0..25 {
            log.record(i as f64, TransitionKind::Cancelled);
        }
        assert!(log.len() <= 10);
        assert_eq!(log.events().last().map(|e| e.time_ms), Some(24.0));
    }

    #[test]
    fn disabled_log_is_noop() {
        let mut log = TransitionLog::disabled();
        log.record(0.0, TransitionKind::Initiated);
        assert!(log.is_empty());
        assert!(!log.is_enabled());
    }

    #[test]
    fn clear_removes_all_events() {
        let mut log = TransitionLog::new(4);
        log.record(1.0, TransitionKind::Rearmed { ca_sr: 1.02 });
        log.clear();
        assert_eq!(log.len(), 0);
    }
}
