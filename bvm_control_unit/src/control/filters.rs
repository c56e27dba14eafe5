//! Signal conditioning primitives.
//!
//! Single-pole IIR low-pass filter and sign helper.
//!
//! ```text
//! y[n] = y[n-1] + alpha × (x[n] - y[n-1])
//! ```
//!
//! `alpha` is the weight of the new sample: `1.0` passes the input through,
//! `0.0` freezes the output.

// ─── Low-Pass Filter (single pole) ──────────────────────────────────

/// Internal state of the single-pole low-pass filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowPassState {
    /// Previous output.
    prev_output: f64,
    /// Set once the first sample has been taken.
    primed: bool,
}

impl LowPassState {
    /// Reset filter state to zero.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Force the output to `value`, as if the filter had settled there.
    #[inline]
    pub fn set(&mut self, value: f64) {
        self.prev_output = value;
        self.primed = true;
    }

    /// Last output.
    #[inline]
    pub fn output(&self) -> f64 {
        self.prev_output
    }

    #[inline]
    pub fn is_primed(&self) -> bool {
        self.primed
    }
}

/// Apply one sample through the filter, starting from the current state
/// (zero after reset).
#[inline]
pub fn lowpass_apply(state: &mut LowPassState, alpha: f64, input: f64) -> f64 {
    let alpha = alpha.clamp(0.0, 1.0);
    let output = state.prev_output + alpha * (input - state.prev_output);
    state.prev_output = output;
    state.primed = true;
    output
}

/// Apply one sample, seeding the filter with the first sample after reset.
///
/// Use for signals whose resting value is far from zero (airway pressure),
/// so the output does not ramp up from zero on start.
#[inline]
pub fn lowpass_apply_seeded(state: &mut LowPassState, alpha: f64, input: f64) -> f64 {
    if !state.primed {
        state.set(input);
        return input;
    }
    lowpass_apply(state, alpha, input)
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Sign of `x` as `-1.0`, `0.0` or `1.0`.
#[inline]
pub fn signof(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
