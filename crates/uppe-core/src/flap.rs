//! Flap detection over a fixed window of recent states.
//!
//! Every processed check records its state into a 21-entry ring. The 20
//! transitions between consecutive entries are weighted linearly from 0.75
//! (oldest) to 1.25 (newest), so recent changes count more, and summed into a
//! percent state change. Hysteresis: flapping starts above the high threshold
//! and stops below the low one.

use tracing::debug;

use crate::options::{CheckState, OptionSet};

/// Entries kept per object
pub const MAX_STATE_HISTORY_ENTRIES: usize = 21;

const LOW_WEIGHT: f64 = 0.75;
const HIGH_WEIGHT: f64 = 1.25;

/// Global thresholds used when an object leaves its own at zero
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlapThresholds {
    pub low: f64,
    pub high: f64,
}

impl Default for FlapThresholds {
    fn default() -> Self {
        Self { low: 5.0, high: 20.0 }
    }
}

/// Per-object flap detection configuration
#[derive(Debug, Clone, Copy)]
pub struct FlapSettings<S: CheckState> {
    pub enabled: bool,
    /// Zero means use the global threshold
    pub low_threshold: f64,
    pub high_threshold: f64,
    /// States in which flapping may start
    pub options: OptionSet<S>,
}

impl<S: CheckState> Default for FlapSettings<S> {
    fn default() -> Self {
        Self { enabled: true, low_threshold: 0.0, high_threshold: 0.0, options: OptionSet::all() }
    }
}

impl<S: CheckState> FlapSettings<S> {
    pub fn disabled() -> Self {
        Self { enabled: false, ..Self::default() }
    }

    pub fn with_thresholds(mut self, low: f64, high: f64) -> Self {
        self.low_threshold = low;
        self.high_threshold = high;
        self
    }

    /// Object thresholds with global fallbacks applied
    pub fn effective(&self, global: FlapThresholds) -> FlapThresholds {
        FlapThresholds {
            low: if self.low_threshold > 0.0 { self.low_threshold } else { global.low },
            high: if self.high_threshold > 0.0 { self.high_threshold } else { global.high },
        }
    }
}

/// Ring buffer of the most recent states
#[derive(Debug, Clone, Copy)]
pub struct StateHistory<S> {
    entries: [S; MAX_STATE_HISTORY_ENTRIES],
    /// Slot the next state is written to, which is also the oldest entry
    index: usize,
}

impl<S: CheckState> StateHistory<S> {
    pub fn new(initial: S) -> Self {
        Self { entries: [initial; MAX_STATE_HISTORY_ENTRIES], index: 0 }
    }

    pub fn record(&mut self, state: S) {
        self.entries[self.index] = state;
        self.index = (self.index + 1) % MAX_STATE_HISTORY_ENTRIES;
    }

    /// Entries from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = S> + '_ {
        (0..MAX_STATE_HISTORY_ENTRIES)
            .map(move |i| self.entries[(self.index + i) % MAX_STATE_HISTORY_ENTRIES])
    }

    /// Weighted percentage of consecutive entries that differ
    pub fn percent_state_change(&self) -> f64 {
        let transitions = MAX_STATE_HISTORY_ENTRIES - 1;
        let mut previous: Option<S> = None;
        let mut weighted = 0.0;
        for (x, state) in self.iter().enumerate() {
            if let Some(prev) = previous {
                if prev != state {
                    // x runs 1..=20 over the transitions
                    let weight = (x - 1) as f64 * (HIGH_WEIGHT - LOW_WEIGHT)
                        / (transitions - 1) as f64
                        + LOW_WEIGHT;
                    weighted += weight;
                }
            }
            previous = Some(state);
        }
        weighted * 100.0 / transitions as f64
    }
}

/// Flap start or stop detected by one update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlapChange {
    Started,
    Stopped,
}

/// Runtime flap bookkeeping of one object
#[derive(Debug, Clone, Copy)]
pub struct FlapState<S> {
    pub history: StateHistory<S>,
    pub is_flapping: bool,
    pub percent_state_change: f64,
}

impl<S: CheckState> FlapState<S> {
    pub fn new(initial: S) -> Self {
        Self { history: StateHistory::new(initial), is_flapping: false, percent_state_change: 0.0 }
    }

    /// Record `state` and re-evaluate flapping
    ///
    /// With detection disabled the history is left alone and any flapping
    /// flag is cleared.
    pub fn update(
        &mut self,
        state: S,
        settings: &FlapSettings<S>,
        global: FlapThresholds,
    ) -> Option<FlapChange> {
        if !settings.enabled {
            if self.is_flapping {
                self.is_flapping = false;
                return Some(FlapChange::Stopped);
            }
            return None;
        }

        self.history.record(state);
        self.percent_state_change = self.history.percent_state_change();
        let thresholds = settings.effective(global);

        if self.is_flapping && self.percent_state_change < thresholds.low {
            self.is_flapping = false;
            debug!(percent = self.percent_state_change, "Flapping stopped");
            return Some(FlapChange::Stopped);
        }
        if !self.is_flapping
            && self.percent_state_change > thresholds.high
            && settings.options.contains(state)
        {
            self.is_flapping = true;
            debug!(percent = self.percent_state_change, "Flapping started");
            return Some(FlapChange::Started);
        }
        None
    }
}
