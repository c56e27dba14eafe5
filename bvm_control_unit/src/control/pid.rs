//! Discrete PID controller with first-sample derivative seeding.
//!
//! Used twice by the servo loop: position (rad → rad/s) and velocity
//! (rad/s → duty). The integral accumulates the raw error every call and is
//! not clamped; the servo's velocity/output saturation is the only bound.

use bvm_common::control_unit::config::PidParams;

/// Internal state of the PID controller.
///
/// Must be reset (via [`PidState::reset`]) whenever the owning loop
/// re-enters a controlled mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct PidState {
    /// Sum of raw errors since the last reset.
    err_acc: f64,
    /// Previous error (for derivative).
    err_last: f64,
    /// False until the first update after construction/reset.
    initialized: bool,
}

impl PidState {
    /// Reset all internal state to zero.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// PID controller with fixed gains and control period.
#[derive(Debug, Clone, Copy)]
pub struct Pid {
    params: PidParams,
    /// Control period [s].
    period: f64,
    state: PidState,
}

impl Pid {
    /// Create a controller running at `period_s` seconds per update.
    pub fn new(params: PidParams, period_s: f64) -> Self {
        Self {
            params,
            period: period_s,
            state: PidState::default(),
        }
    }

    #[inline]
    pub fn params(&self) -> &PidParams {
        &self.params
    }

    #[inline]
    pub fn period(&self) -> f64 {
        self.period
    }

    /// Accumulated error since the last reset.
    #[inline]
    pub fn accumulated_error(&self) -> f64 {
        self.state.err_acc
    }

    /// Clear accumulator, last error and the initialized flag. Gains are kept.
    #[inline]
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Compute one control output.
    ///
    /// On the first call after construction or [`reset`](Self::reset) the
    /// previous error is seeded with the current one, so the derivative term
    /// contributes nothing on that call.
    ///
    /// Returns `0.0` for a non-positive period.
    pub fn update(&mut self, target: f64, measurement: f64) -> f64 {
        if self.period <= 0.0 {
            return 0.0;
        }

        let err = target - measurement;

        if !self.state.initialized {
            self.state.err_last = err;
            self.state.err_acc = 0.0;
            self.state.initialized = true;
        }

        self.state.err_acc += err;

        let derr = err - self.state.err_last;
        self.state.err_last = err;

        self.params.kp * err
            + self.params.ki * self.state.err_acc * self.period
            + self.params.kd * derr / self.period
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
