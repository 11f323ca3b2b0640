//! Row injection - the grid grows a new top row after enough misses.
//!
//! Every non-clearing shot bumps a counter. When it reaches the current
//! threshold a row is injected and the threshold tightens by one, down to a
//! floor; an injection at the floor resets the threshold to its maximum.

/// Counter and threshold for row injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectionPolicy {
    counter: u32,
    threshold: u32,
    max_threshold: u32,
    min_threshold: u32,
}

impl InjectionPolicy {
    /// `min_threshold` is clamped to at least 1 and at most `max_threshold`.
    pub fn new(max_threshold: u32, min_threshold: u32) -> Self {
        let max_threshold = max_threshold.max(1);
        let min_threshold = min_threshold.clamp(1, max_threshold);
        Self {
            counter: 0,
            threshold: max_threshold,
            max_threshold,
            min_threshold,
        }
    }

    /// Non-clearing shots since the last injection.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Shots left before the next injection.
    pub fn shots_remaining(&self) -> u32 {
        self.threshold.saturating_sub(self.counter)
    }

    /// Count a non-clearing shot. Returns true when a row is due, in which
    /// case the counter has already been reset.
    pub fn register_shot(&mut self) -> bool {
        self.counter += 1;
        if self.counter >= self.threshold {
            self.counter = 0;
            true
        } else {
            false
        }
    }

    /// Tighten the threshold after a successful injection.
    pub fn row_injected(&mut self) {
        self.threshold = if self.threshold > self.min_threshold {
            self.threshold - 1
        } else {
            self.max_threshold
        };
    }

    pub fn reset(&mut self) {
        self.counter = 0;
        self.threshold = self.max_threshold;
    }
}
