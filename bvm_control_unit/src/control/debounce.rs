//! Debounced predicate: a condition must hold for more than `threshold`
//! consecutive samples before it is reported as true.
//!
//! One instance per servo fault detector. The counter resets to zero on the
//! first sample where the condition is false.

/// Consecutive-sample counter with a trip threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebouncedPredicate {
    threshold: u32,
    count: u32,
}

impl DebouncedPredicate {
    pub const fn new(threshold: u32) -> Self {
        Self {
            threshold,
            count: 0,
        }
    }

    /// Feed one sample. Returns true once the condition has held for more
    /// than `threshold` consecutive samples.
    #[inline]
    pub fn update(&mut self, condition: bool) -> bool {
        if condition {
            self.count = self.count.saturating_add(1);
        } else {
            self.count = 0;
        }
        self.count > self.threshold
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[inline]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    #[inline]
    pub fn reset(&mut self) {
        self.count = 0;
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
