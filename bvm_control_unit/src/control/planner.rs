//! Trapezoidal motion-profile generator.
//!
//! Converts a [`MotionPlan`] (target position + duration) into a
//! tick-discretized velocity profile: linear ramp-up, constant cruise,
//! linear ramp-down. Velocity is expressed as position delta per tick.
//!
//! ## Discretization
//!
//! ```text
//! n_accel = floor(t_a × T / dt)
//! n_decel = floor(t_d × T / dt)
//! n_const = floor(max(0, 1 − t_a − t_d) × T / dt)
//! v_max   = dp / (0.5·n_accel + 0.5·n_decel + n_const)
//! ```
//!
//! The profile lasts `n_accel + n_const + n_decel` ticks, which is never
//! longer than the requested duration. The last decelerating tick lands
//! exactly on the target.

use bvm_common::control_unit::config::PlannerConfig;
use bvm_common::control_unit::state::PlannerPhase;

/// Guards `floor()` against products like `0.3 × 1000 / 10 = 29.999…`.
const TICK_EPSILON: f64 = 1e-9;

// ─── Motion Plan ────────────────────────────────────────────────────

/// One motion segment requested by a sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionPlan {
    /// Target position (same unit as the positions passed to `run`).
    pub p_target: f64,
    /// Target velocity at the end of the segment. Not used by the
    /// trapezoidal profile, which always ends at rest.
    pub v_target: f64,
    /// Requested duration [ms].
    pub time_total_ms: f64,
}

impl MotionPlan {
    pub const fn new(p_target: f64, time_total_ms: f64) -> Self {
        Self {
            p_target,
            v_target: 0.0,
            time_total_ms,
        }
    }
}

// ─── Planner Interface ──────────────────────────────────────────────

/// Tick-driven motion-profile generator.
///
/// Sequencers are generic over this trait so the control loop uses static
/// dispatch.
pub trait MotionPlanner {
    /// Stage a plan for adoption once the planner is idle. Overwrites any
    /// staged plan that has not been adopted yet.
    fn set_next(&mut self, plan: MotionPlan);

    /// Stage a plan and abandon the profile in progress, so the plan is
    /// adopted on the next `run`.
    fn force_next(&mut self, plan: MotionPlan);

    /// Advance one tick and return the new commanded position.
    fn run(&mut self, current_pos: f64) -> f64;

    /// True when no motion is in progress.
    fn is_idle(&self) -> bool;

    /// Return to idle and drop the staged plan.
    fn reset(&mut self);

    /// Last commanded position.
    fn position(&self) -> f64;
}

// ─── Trapezoidal Planner ────────────────────────────────────────────

/// Discretized trapezoidal profile.
#[derive(Debug, Clone)]
pub struct TrapezoidalPlanner {
    t_a_percent: f64,
    t_d_percent: f64,
    /// Tick period [ms].
    dt_ms: f64,

    plan: MotionPlan,
    next: Option<MotionPlan>,

    n_accel: u32,
    n_const: u32,
    n_decel: u32,
    /// Ticks spent in the current phase.
    phase_ticks: u32,

    v_max: f64,
    accel: f64,
    decel: f64,

    v_last: f64,
    p_last: f64,
    phase: PlannerPhase,
}

impl TrapezoidalPlanner {
    /// Create a planner advancing `dt_ms` milliseconds per `run` call.
    pub fn new(config: &PlannerConfig, dt_ms: f64) -> Self {
        Self {
            t_a_percent: config.t_a_percent,
            t_d_percent: config.t_d_percent,
            dt_ms,
            plan: MotionPlan::default(),
            next: None,
            n_accel: 0,
            n_const: 0,
            n_decel: 0,
            phase_ticks: 0,
            v_max: 0.0,
            accel: 0.0,
            decel: 0.0,
            v_last: 0.0,
            p_last: 0.0,
            phase: PlannerPhase::Idle,
        }
    }

    #[inline]
    pub fn phase(&self) -> PlannerPhase {
        self.phase
    }

    /// Plan currently executing (or last executed).
    #[inline]
    pub fn plan(&self) -> &MotionPlan {
        &self.plan
    }

    #[inline]
    pub fn has_staged(&self) -> bool {
        self.next.is_some()
    }

    /// Last commanded velocity [position units per tick].
    #[inline]
    pub fn velocity(&self) -> f64 {
        self.v_last
    }

    /// Peak velocity of the current profile [position units per tick].
    #[inline]
    pub fn peak_velocity(&self) -> f64 {
        self.v_max
    }

    /// Discretized tick counts of the current profile: (accel, const, decel).
    #[inline]
    pub fn tick_counts(&self) -> (u32, u32, u32) {
        (self.n_accel, self.n_const, self.n_decel)
    }

    /// Discretized duration of the current profile [ms].
    pub fn profile_duration_ms(&self) -> f64 {
        f64::from(self.n_accel + self.n_const + self.n_decel) * self.dt_ms
    }

    fn ticks_for(&self, fraction: f64, duration_ms: f64) -> u32 {
        let ticks = (fraction * duration_ms / self.dt_ms + TICK_EPSILON).floor();
        if ticks.is_finite() && ticks > 0.0 {
            ticks.min(f64::from(u32::MAX)) as u32
        } else {
            0
        }
    }

    /// Discretize `plan` starting from `pos`. Returns false (and stays
    /// idle) when the duration cannot be split into non-empty ramps.
    fn adopt(&mut self, plan: MotionPlan, pos: f64) -> bool {
        self.plan = plan;
        self.v_last = 0.0;
        self.p_last = pos;
        self.phase_ticks = 0;

        if self.dt_ms <= 0.0 || plan.time_total_ms <= self.dt_ms {
            self.clear_profile();
            return false;
        }

        let t = plan.time_total_ms;
        self.n_accel = self.ticks_for(self.t_a_percent, t);
        self.n_decel = self.ticks_for(self.t_d_percent, t);
        let cruise = (1.0 - self.t_a_percent - self.t_d_percent).clamp(0.0, 1.0);
        self.n_const = self.ticks_for(cruise, t);

        if self.n_accel == 0 || self.n_decel == 0 {
            self.clear_profile();
            return false;
        }

        let dp = plan.p_target - pos;
        let span = 0.5 * f64::from(self.n_accel)
            + 0.5 * f64::from(self.n_decel)
            + f64::from(self.n_const);
        self.v_max = dp / span;
        self.accel = self.v_max / f64::from(self.n_accel);
        self.decel = -self.v_max / f64::from(self.n_decel);
        self.phase = PlannerPhase::Accelerating;
        true
    }

    fn clear_profile(&mut self) {
        self.n_accel = 0;
        self.n_const = 0;
        self.n_decel = 0;
        self.v_max = 0.0;
        self.accel = 0.0;
        self.decel = 0.0;
        self.phase = PlannerPhase::Idle;
    }

    fn step(&mut self) {
        match self.phase {
            PlannerPhase::Idle => {}
            PlannerPhase::Accelerating => {
                self.v_last += self.accel;
                self.p_last += self.v_last;
                self.phase_ticks += 1;
                if self.phase_ticks >= self.n_accel {
                    self.phase_ticks = 0;
                    self.phase = if self.n_const > 0 {
                        PlannerPhase::Constant
                    } else {
                        PlannerPhase::Decelerating
                    };
                }
            }
            PlannerPhase::Constant => {
                self.v_last = self.v_max;
                self.p_last += self.v_last;
                self.phase_ticks += 1;
                if self.phase_ticks >= self.n_const {
                    self.phase_ticks = 0;
                    self.phase = PlannerPhase::Decelerating;
                }
            }
            PlannerPhase::Decelerating => {
                self.v_last += self.decel;
                self.p_last += self.v_last;
                self.phase_ticks += 1;
                if self.phase_ticks >= self.n_decel {
                    self.phase_ticks = 0;
                    self.p_last = self.plan.p_target;
                    self.v_last = 0.0;
                    self.phase = PlannerPhase::Idle;
                }
            }
        }
    }
}

impl MotionPlanner for TrapezoidalPlanner {
    fn set_next(&mut self, plan: MotionPlan) {
        self.next = Some(plan);
    }

    fn force_next(&mut self, plan: MotionPlan) {
        self.next = Some(plan);
        self.phase = PlannerPhase::Idle;
        self.phase_ticks = 0;
        self.v_last = 0.0;
    }

    fn run(&mut self, current_pos: f64) -> f64 {
        if self.phase == PlannerPhase::Idle {
            match self.next.take() {
                Some(plan) => {
                    if !self.adopt(plan, current_pos) {
                        return current_pos;
                    }
                }
                None => {
                    self.p_last = current_pos;
                    return current_pos;
                }
            }
        }
        self.step();
        self.p_last
    }

    #[inline]
    fn is_idle(&self) -> bool {
        self.phase == PlannerPhase::Idle
    }

    fn reset(&mut self) {
        self.next = None;
        self.phase_ticks = 0;
        self.v_last = 0.0;
        self.clear_profile();
    }

    #[inline]
    fn position(&self) -> f64 {
        self.p_last
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const DT_MS: f64 = 10.0;

    fn planner() -> TrapezoidalPlanner {
        TrapezoidalPlanner::new(&PlannerConfig::default(), DT_MS)
    }

    fn planner_with(t_a: f64, t_d: f64) -> TrapezoidalPlanner {
        TrapezoidalPlanner::new(
            &PlannerConfig {
                t_a_percent: t_a,
                t_d_percent: t_d,
            },
            DT_MS,
        )
    }

    /// Run until idle, returning the number of ticks taken and the positions.
    fn run_to_idle(p: &mut TrapezoidalPlanner, start: f64, limit: usize) -> (usize, Vec<f64>) {
        let mut pos = start;
        let mut trace = Vec::new();
        for tick in 1..=limit {
            pos = p.run(pos);
            trace.push(pos);
            if p.is_idle() {
                return (tick, trace);
            }
        }
        (limit, trace)
    }

    #[test]
    fn reaches_target_exactly_at_discretized_duration() {
        let mut p = planner();
        p.set_next(MotionPlan::new(90.0, 1000.0));
        let (ticks, trace) = run_to_idle(&mut p, 35.0, 1000);
        assert_eq!(ticks, 100);
        assert_eq!(*trace.last().unwrap(), 90.0);
        assert!(p.is_idle());
        // The last ramp-down tick carries zero velocity; two ticks out the
        // arm is still short of the target.
        assert!(trace[97] < 90.0 - 1e-6);
    }

    #[test]
    fn truncated_duration_never_overshoots_request() {
        let mut p = planner();
        // 1666.67 ms at 10 ms: 83 + 83 ticks.
        p.set_next(MotionPlan::new(20.0, 60_000.0 / 12.0 / 3.0));
        let (ticks, _) = run_to_idle(&mut p, 0.0, 1000);
        assert_eq!(ticks, 166);
        assert!(p.profile_duration_ms() <= 60_000.0 / 12.0 / 3.0);
        assert_eq!(p.tick_counts(), (83, 0, 83));
    }

    #[test]
    fn profile_is_monotonic_with_cruise_phase() {
        let mut p = planner_with(0.25, 0.25);
        p.set_next(MotionPlan::new(10.0, 400.0));
        let (ticks, trace) = run_to_idle(&mut p, 0.0, 100);
        assert_eq!(ticks, 40);
        assert_eq!(p.tick_counts(), (10, 20, 10));
        for w in trace.windows(2) {
            assert!(w[1] >= w[0] - 1e-9);
        }
        assert!((trace[ticks - 1] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn moves_in_negative_direction() {
        let mut p = planner();
        p.set_next(MotionPlan::new(1.0, 3000.0));
        let (ticks, trace) = run_to_idle(&mut p, 35.0, 1000);
        assert_eq!(ticks, 300);
        assert!(trace[0] < 35.0);
        assert_eq!(p.position(), 1.0);
        assert!(p.peak_velocity() < 0.0);
    }

    #[test]
    fn duration_shorter_than_tick_holds_position() {
        let mut p = planner();
        p.set_next(MotionPlan::new(50.0, 5.0));
        assert_eq!(p.run(12.0), 12.0);
        assert!(p.is_idle());
        assert!(!p.has_staged());
    }

    #[test]
    fn zero_accel_ticks_is_degenerate() {
        // 15 ms: 0.5 × 15 / 10 floors to zero ramp ticks.
        let mut p = planner();
        p.set_next(MotionPlan::new(50.0, 15.0));
        assert_eq!(p.run(3.0), 3.0);
        assert!(p.is_idle());
    }

    #[test]
    fn zero_tick_period_is_degenerate() {
        let mut p = TrapezoidalPlanner::new(&PlannerConfig::default(), 0.0);
        p.set_next(MotionPlan::new(50.0, 1000.0));
        assert_eq!(p.run(7.0), 7.0);
        assert!(p.is_idle());
    }

    #[test]
    fn idle_without_plan_is_idempotent() {
        let mut p = planner();
        for _ in 0..5 {
            assert_eq!(p.run(4.5), 4.5);
        }
        assert_eq!(p.position(), 4.5);
        assert!(p.is_idle());
    }

    #[test]
    fn staged_plan_waits_for_current_profile() {
        let mut p = planner();
        p.set_next(MotionPlan::new(10.0, 200.0));
        let mut pos = p.run(0.0);
        p.set_next(MotionPlan::new(-10.0, 200.0));
        while !p.is_idle() {
            pos = p.run(pos);
        }
        assert_eq!(pos, 10.0);
        assert!(p.has_staged());

        let (_, trace) = run_to_idle(&mut p, pos, 100);
        assert_eq!(*trace.last().unwrap(), -10.0);
    }

    #[test]
    fn set_next_overwrites_unadopted_plan() {
        let mut p = planner();
        p.set_next(MotionPlan::new(10.0, 200.0));
        p.set_next(MotionPlan::new(20.0, 200.0));
        run_to_idle(&mut p, 0.0, 100);
        assert_eq!(p.position(), 20.0);
    }

    #[test]
    fn force_next_abandons_profile_in_progress() {
        let mut p = planner();
        p.set_next(MotionPlan::new(90.0, 2000.0));
        let mut pos = 35.0;
        for _ in 0..50 {
            pos = p.run(pos);
        }
        assert!(!p.is_idle());

        p.force_next(MotionPlan::new(35.0, 200.0));
        assert!(p.is_idle());
        let (ticks, trace) = run_to_idle(&mut p, pos, 100);
        assert_eq!(ticks, 20);
        assert_eq!(*trace.last().unwrap(), 35.0);
        assert_eq!(p.plan().time_total_ms, 200.0);
    }

    #[test]
    fn reset_drops_staged_plan_and_motion() {
        let mut p = planner();
        p.set_next(MotionPlan::new(90.0, 2000.0));
        p.run(0.0);
        p.set_next(MotionPlan::new(10.0, 2000.0));
        p.reset();
        assert!(p.is_idle());
        assert!(!p.has_staged());
        assert_eq!(p.run(3.0), 3.0);
    }
}
