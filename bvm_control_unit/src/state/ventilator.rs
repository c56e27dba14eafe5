//! Respiration state machine.
//!
//! Sequences the arm through breaths by staging motion segments on a
//! [`MotionPlanner`] and commanding the servo with the planner output.
//!
//! ## Cycle
//!
//! ```text
//! IDLE ─(operational)─► GO_TO_START ─► INSPIRATION ─┬─────────────────────► EXPIRATION ─┐
//!                                        ▲          └─► INSPIRATORY_HOLD ─┘             │
//!                                        └──────────────────────────────────────────────┘
//! any state ─(not operational, segment done)─► GO_TO_IDLE ─► IDLE
//! ```
//!
//! Each state names the segment currently executing. Transitions happen only
//! when the planner reports idle, so a segment always completes before the
//! next one is staged. The safety interlock is the exception: it overrides
//! the segment in progress with a fast opening.
//!
//! Tidal-volume and rate selections are double-buffered: a change takes
//! effect at the next INSPIRATION transition.

use bvm_common::consts::bpm_to_period_ms;
use bvm_common::control_unit::config::{
    IeRatio, MotionConfig, PlannerConfig, Range, RespirationConfig, SettingTable,
};
use bvm_common::control_unit::state::{ServoMode, VentilatorState};
use bvm_common::control_unit::telemetry::VentilatorTelemetry;
use tracing::{debug, info};

use crate::control::planner::{MotionPlan, MotionPlanner, TrapezoidalPlanner};
use crate::control::servo::ServoAxis;
use crate::safety::interlock::{PressureInterlock, TripCause};

/// Top-level respiration sequencer.
#[derive(Debug, Clone)]
pub struct VentilatorController<P: MotionPlanner = TrapezoidalPlanner> {
    planner: P,
    state: VentilatorState,
    operational: bool,

    // ── geometry and timing ──
    idle_pos_deg: f64,
    open_pos_deg: f64,
    ie_ratio: IeRatio,
    time_to_idle_ms: f64,
    plateau_time_ms: f64,
    fast_open_time_ms: f64,
    plateau_measurement_interval: u32,

    // ── settings ──
    tidal_volume_settings: SettingTable,
    rate_settings: SettingTable,
    current_tv_idx: usize,
    next_tv_idx: usize,
    current_rate_idx: usize,
    next_rate_idx: usize,
    peak_pressure_display: Range,
    peak_pressure_limit_increment: f64,

    // ── per-breath ──
    is_measure_plateau_cycle: bool,
    /// Time carved out of the expiration segment: plateau hold, fast-open, or zero.
    plateau_time: f64,
    is_fast_open: bool,
    /// A segment was forced onto the planner outside the normal sequence;
    /// it must be adopted before the sequence advances.
    segment_forced: bool,
    breath_count: u32,

    // ── pressure measurements ──
    current_peak: f64,
    last_peak: f64,
    current_plateau: f64,
    plateau_measured: bool,
    last_plateau: f64,

    interlock: PressureInterlock,
}

impl VentilatorController<TrapezoidalPlanner> {
    /// Controller with a trapezoidal planner ticking every `control_period_ms`.
    pub fn with_trapezoidal(
        motion: &MotionConfig,
        respiration: &RespirationConfig,
        planner: &PlannerConfig,
        control_period_ms: f64,
    ) -> Self {
        Self::new(
            motion,
            respiration,
            TrapezoidalPlanner::new(planner, control_period_ms),
        )
    }
}

impl<P: MotionPlanner> VentilatorController<P> {
    pub fn new(motion: &MotionConfig, respiration: &RespirationConfig, planner: P) -> Self {
        Self {
            planner,
            state: VentilatorState::GoToIdle,
            operational: false,
            idle_pos_deg: motion.idle_pos_deg,
            open_pos_deg: motion.open_pos_deg,
            ie_ratio: motion.ie_ratio,
            time_to_idle_ms: f64::from(respiration.time_to_idle_ms),
            plateau_time_ms: f64::from(respiration.plateau_time_ms),
            fast_open_time_ms: f64::from(respiration.fast_open_time_ms),
            plateau_measurement_interval: respiration.plateau_measurement_interval,
            tidal_volume_settings: respiration.tidal_volume_settings.clone(),
            rate_settings: respiration.rate_settings.clone(),
            current_tv_idx: 0,
            next_tv_idx: 0,
            current_rate_idx: 0,
            next_rate_idx: 0,
            peak_pressure_display: respiration.peak_pressure_display,
            peak_pressure_limit_increment: respiration.peak_pressure_limit_increment,
            is_measure_plateau_cycle: false,
            plateau_time: 0.0,
            is_fast_open: false,
            segment_forced: false,
            breath_count: 0,
            current_peak: 0.0,
            last_peak: 0.0,
            current_plateau: f64::INFINITY,
            plateau_measured: false,
            last_plateau: 0.0,
            interlock: PressureInterlock::new(
                respiration.pressure_filter_alpha,
                respiration
                    .peak_pressure_display
                    .saturate(respiration.default_peak_pressure_limit),
                respiration.max_motor_current_a,
            ),
        }
    }

    // ─── Lifecycle ──────────────────────────────────────────────────

    /// Put the servo in POSITION mode and start a slow move to the idle
    /// position from wherever the arm is.
    pub fn start(&mut self, servo: &mut impl ServoAxis) {
        servo.set_mode(ServoMode::Position);
        self.transition(VentilatorState::GoToIdle);
        self.planner
            .set_next(MotionPlan::new(self.idle_pos_deg, self.time_to_idle_ms));
        let p = self.planner.run(servo.position_deg());
        servo.set_pos_deg(p);
    }

    /// Abandon the breath in progress and move to the idle position.
    pub fn stop(&mut self) {
        self.force_idle();
        info!("ventilation stopped");
    }

    /// Return to the power-on sequencing state: settings back to the first
    /// table entries, pressure filter re-seeded, and the arm moved to the
    /// idle position from wherever the current segment has brought it.
    pub fn reset(&mut self) {
        self.force_idle();
        self.current_tv_idx = 0;
        self.next_tv_idx = 0;
        self.current_rate_idx = 0;
        self.next_rate_idx = 0;
        self.is_measure_plateau_cycle = false;
        self.plateau_time = 0.0;
        self.interlock.reset_filter();
    }

    /// One sequencing tick with a raw pressure sample [cmH2O].
    pub fn update(&mut self, pressure: f64, servo: &mut impl ServoAxis) {
        let filtered = self.interlock.sample(pressure);
        self.measure(filtered);

        if let Some(cause) = self.interlock.check(self.state, servo.current()) {
            self.fast_open(cause);
        }

        if self.segment_forced {
            self.segment_forced = false;
        } else if self.planner.is_idle() {
            self.advance();
        }

        let p = self.planner.run(self.planner.position());
        servo.set_pos_deg(p);
    }

    // ─── Sequencing ─────────────────────────────────────────────────

    fn advance(&mut self) {
        let draining = !self.operational
            && (self.state.is_breathing() || self.state == VentilatorState::GoToStart);
        if draining {
            self.go_to_idle();
            return;
        }

        match self.state {
            VentilatorState::Idle => {
                if self.operational {
                    self.transition(VentilatorState::GoToStart);
                    self.planner
                        .set_next(MotionPlan::new(self.open_pos_deg, self.time_to_idle_ms));
                }
            }
            VentilatorState::GoToStart => self.begin_inspiration(),
            VentilatorState::Inspiration => {
                if self.is_measure_plateau_cycle {
                    self.transition(VentilatorState::InspiratoryHold);
                    self.planner
                        .set_next(MotionPlan::new(self.closed_pos(), self.plateau_time_ms));
                } else {
                    self.begin_expiration();
                }
            }
            VentilatorState::InspiratoryHold => {
                self.plateau_measured = self.current_plateau.is_finite();
                self.begin_expiration();
            }
            VentilatorState::Expiration => {
                if self.is_fast_open {
                    // Fast opening done: dwell open for the rest of the breath.
                    self.is_fast_open = false;
                    self.planner.set_next(MotionPlan::new(
                        self.open_pos_deg,
                        self.expiration_time_ms() - self.plateau_time,
                    ));
                } else {
                    self.begin_inspiration();
                }
            }
            VentilatorState::GoToIdle => self.transition(VentilatorState::Idle),
        }
    }

    fn begin_inspiration(&mut self) {
        if self.breath_count > 0 {
            self.last_peak = self.current_peak;
        }
        self.current_peak = 0.0;
        if self.plateau_measured {
            self.last_plateau = self.current_plateau;
        }
        self.current_plateau = f64::INFINITY;
        self.plateau_measured = false;

        self.current_tv_idx = self.next_tv_idx;
        self.current_rate_idx = self.next_rate_idx;

        self.breath_count = self.breath_count.saturating_add(1);
        self.is_measure_plateau_cycle = self.plateau_measurement_interval > 0
            && self.breath_count % self.plateau_measurement_interval == 0;
        self.plateau_time = if self.is_measure_plateau_cycle {
            self.plateau_time_ms
        } else {
            0.0
        };
        self.is_fast_open = false;

        self.transition(VentilatorState::Inspiration);
        let duration = self.ie_ratio.inspiration_fraction() * self.breath_period_ms();
        self.planner
            .set_next(MotionPlan::new(self.closed_pos(), duration));
    }

    fn begin_expiration(&mut self) {
        self.transition(VentilatorState::Expiration);
        self.planner.set_next(MotionPlan::new(
            self.open_pos_deg,
            self.expiration_time_ms() - self.plateau_time,
        ));
    }

    fn force_idle(&mut self) {
        self.planner
            .force_next(MotionPlan::new(self.idle_pos_deg, self.time_to_idle_ms));
        self.operational = false;
        self.is_fast_open = false;
        self.segment_forced = true;
        self.current_peak = 0.0;
        self.last_peak = 0.0;
        self.transition(VentilatorState::GoToIdle);
    }

    fn go_to_idle(&mut self) {
        self.is_fast_open = false;
        self.transition(VentilatorState::GoToIdle);
        self.planner
            .set_next(MotionPlan::new(self.idle_pos_deg, self.time_to_idle_ms));
    }

    fn fast_open(&mut self, cause: TripCause) {
        self.planner
            .force_next(MotionPlan::new(self.open_pos_deg, self.fast_open_time_ms));
        self.is_fast_open = true;
        self.segment_forced = true;
        self.plateau_time = self.fast_open_time_ms;
        self.plateau_measured = false;
        debug!(?cause, from = ?self.state, "fast-open segment forced");
        self.state = VentilatorState::Expiration;
    }

    fn measure(&mut self, filtered: f64) {
        if filtered > self.current_peak {
            self.current_peak = filtered;
        }
        if self.state == VentilatorState::InspiratoryHold && filtered < self.current_plateau {
            self.current_plateau = filtered;
        }
    }

    fn transition(&mut self, next: VentilatorState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, breath = self.breath_count, "ventilator state");
        }
        self.state = next;
    }

    // ─── Settings ───────────────────────────────────────────────────

    pub fn set_operational(&mut self, operational: bool) {
        if self.operational != operational {
            info!(operational, "ventilation mode changed");
        }
        self.operational = operational;
    }

    #[inline]
    pub fn is_operational(&self) -> bool {
        self.operational
    }

    /// Move the pending tidal-volume selection by `delta`, saturated to the table.
    pub fn bump_tv(&mut self, delta: i32) {
        let max = self.tidal_volume_settings.len().saturating_sub(1);
        self.next_tv_idx = bump_index(self.next_tv_idx, delta, max);
        info!(tv_idx = self.next_tv_idx, "tidal volume selection");
    }

    /// Move the pending rate selection by `delta`, saturated to the table.
    pub fn bump_rate(&mut self, delta: i32) {
        let max = self.rate_settings.len().saturating_sub(1);
        self.next_rate_idx = bump_index(self.next_rate_idx, delta, max);
        info!(rate_idx = self.next_rate_idx, "rate selection");
    }

    /// Select a tidal-volume index directly (saturated).
    pub fn set_tv_idx(&mut self, idx: usize) {
        self.next_tv_idx = idx.min(self.tidal_volume_settings.len().saturating_sub(1));
    }

    /// Select a rate index directly (saturated).
    pub fn set_rate_idx(&mut self, idx: usize) {
        self.next_rate_idx = idx.min(self.rate_settings.len().saturating_sub(1));
    }

    /// Pending tidal-volume index (applies at the next inspiration).
    #[inline]
    pub fn tv_idx(&self) -> usize {
        self.next_tv_idx
    }

    /// Pending rate index (applies at the next inspiration).
    #[inline]
    pub fn rate_idx(&self) -> usize {
        self.next_rate_idx
    }

    #[inline]
    pub fn current_tv_idx(&self) -> usize {
        self.current_tv_idx
    }

    #[inline]
    pub fn current_rate_idx(&self) -> usize {
        self.current_rate_idx
    }

    /// Closed arm position of the breath in progress [deg].
    pub fn closed_pos(&self) -> f64 {
        self.tidal_volume_settings
            .get(self.current_tv_idx)
            .copied()
            .unwrap_or(self.open_pos_deg)
    }

    /// Breath rate of the breath in progress [breaths/min].
    pub fn rate_bpm(&self) -> f64 {
        self.rate_settings
            .get(self.current_rate_idx)
            .copied()
            .unwrap_or(0.0)
    }

    fn breath_period_ms(&self) -> f64 {
        bpm_to_period_ms(self.rate_bpm())
    }

    fn expiration_time_ms(&self) -> f64 {
        self.ie_ratio.expiration_fraction() * self.breath_period_ms()
    }

    /// Step the peak pressure limit by `steps` increments, saturated to the
    /// display range.
    pub fn adjust_peak_pressure_limit(&mut self, steps: i32) {
        let limit = self.interlock.limit() + f64::from(steps) * self.peak_pressure_limit_increment;
        self.set_peak_pressure_limit(limit);
    }

    /// Set the peak pressure limit, saturated to the display range.
    pub fn set_peak_pressure_limit(&mut self, limit: f64) {
        let limit = self.peak_pressure_display.saturate(limit);
        self.interlock.set_limit(limit);
        info!(limit, "peak pressure limit");
    }

    #[inline]
    pub fn peak_pressure_limit(&self) -> f64 {
        self.interlock.limit()
    }

    // ─── Telemetry ──────────────────────────────────────────────────

    #[inline]
    pub fn state(&self) -> VentilatorState {
        self.state
    }

    /// Filtered airway pressure [cmH2O].
    #[inline]
    pub fn pressure(&self) -> f64 {
        self.interlock.pressure()
    }

    /// Peak pressure of the last completed breath.
    #[inline]
    pub fn peak_pressure(&self) -> f64 {
        self.last_peak
    }

    /// Running peak since the current breath started.
    #[inline]
    pub fn current_peak_pressure(&self) -> f64 {
        self.current_peak
    }

    /// Plateau pressure of the last measured breath.
    #[inline]
    pub fn plateau_pressure(&self) -> f64 {
        self.last_plateau
    }

    #[inline]
    pub fn is_measure_plateau_cycle(&self) -> bool {
        self.is_measure_plateau_cycle
    }

    #[inline]
    pub fn is_fast_open(&self) -> bool {
        self.is_fast_open
    }

    /// Time carved out of the current expiration segment [ms].
    #[inline]
    pub fn plateau_time_ms(&self) -> f64 {
        self.plateau_time
    }

    /// Inspirations started since construction.
    #[inline]
    pub fn breath_count(&self) -> u32 {
        self.breath_count
    }

    #[inline]
    pub fn interlock_trips(&self) -> u32 {
        self.interlock.trips()
    }

    #[inline]
    pub fn last_trip_cause(&self) -> Option<TripCause> {
        self.interlock.last_cause()
    }

    /// Non-finite pressure samples discarded by the interlock filter.
    #[inline]
    pub fn rejected_pressure_samples(&self) -> u32 {
        self.interlock.rejected_samples()
    }

    #[inline]
    pub fn planner(&self) -> &P {
        &self.planner
    }

    pub fn telemetry(&self) -> VentilatorTelemetry {
        VentilatorTelemetry {
            state: self.state,
            operational: self.operational,
            pressure: self.pressure(),
            peak_pressure: self.last_peak,
            plateau_pressure: self.last_plateau,
            peak_pressure_limit: self.peak_pressure_limit(),
            tv_idx: u8::try_from(self.next_tv_idx).unwrap_or(u8::MAX),
            rate_idx: u8::try_from(self.next_rate_idx).unwrap_or(u8::MAX),
            breath_count: self.breath_count,
            interlock_trips: self.interlock.trips(),
            rejected_pressure_samples: self.interlock.rejected_samples(),
        }
    }
}

fn bump_index(idx: usize, delta: i32, max: usize) -> usize {
    let moved = if delta >= 0 {
        idx.saturating_add(delta.unsigned_abs() as usize)
    } else {
        idx.saturating_sub(delta.unsigned_abs() as usize)
    };
    moved.min(max)
}

// ─── Tests ──────────────────────────────────────────────────────────
