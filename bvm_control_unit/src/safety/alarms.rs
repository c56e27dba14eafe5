//! Prioritised alarm registry and the slow-tick evaluator that drives it.
//!
//! Alarms are ordered by priority; the lowest discriminant wins:
//!
//! | Priority | Alarm          | Source                                        |
//! |----------|----------------|-----------------------------------------------|
//! | 0        | LOSS_OF_POWER  | caller (power supervision is external)        |
//! | 1        | OVER_PRESSURE  | peak or filtered pressure at/above the limit  |
//! | 2        | UNDER_PRESSURE | completed breath with a low peak              |
//! | 3        | OVER_CURRENT   | servo OVERCURRENT fault or current interlock  |
//! | 4        | MOTION_FAULT   | any other latched servo fault                 |
//!
//! A current-caused interlock trip keeps OVER_CURRENT raised until a full
//! breath has completed after the trip, or until the latches are cleared.
//!
//! Timestamps are tick-derived milliseconds supplied by the scheduler.

use bitflags::bitflags;
use bvm_common::control_unit::config::AlarmConfig;
use bvm_common::control_unit::error::ServoFaults;
use bvm_common::control_unit::telemetry::VentilatorTelemetry;
use static_assertions::const_assert;
use tracing::{info, warn};

use super::interlock::TripCause;

// ─── Alarm Kinds ────────────────────────────────────────────────────

/// Alarm identifiers in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum AlarmKind {
    LossOfPower = 0,
    OverPressure = 1,
    UnderPressure = 2,
    OverCurrent = 3,
    MotionFault = 4,
}

/// Number of alarm kinds.
pub const ALARM_COUNT: usize = 5;

// Active alarms are reported as a `u8` bitmask.
const_assert!(ALARM_COUNT <= 8);

impl AlarmKind {
    /// All kinds, highest priority first.
    pub const ALL: [Self; ALARM_COUNT] = [
        Self::LossOfPower,
        Self::OverPressure,
        Self::UnderPressure,
        Self::OverCurrent,
        Self::MotionFault,
    ];

    /// Bit of this alarm in [`AlarmSet`].
    #[inline]
    pub const fn flag(self) -> AlarmSet {
        AlarmSet::from_bits_truncate(1 << self as u8)
    }
}

bitflags! {
    /// Active alarms as a bitmask (bit n = `AlarmKind` discriminant n).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AlarmSet: u8 {
        const LOSS_OF_POWER  = 1 << 0;
        const OVER_PRESSURE  = 1 << 1;
        const UNDER_PRESSURE = 1 << 2;
        const OVER_CURRENT   = 1 << 3;
        const MOTION_FAULT   = 1 << 4;
    }
}

// ─── Registry ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
struct AlarmState {
    alarmed: bool,
    /// Tick-time of the last transition [ms].
    since_ms: u64,
}

/// Alarm registry.
#[derive(Debug, Clone, Default)]
pub struct Alarms {
    states: [AlarmState; ALARM_COUNT],
}

impl Alarms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or clear an alarm. The transition time is recorded only when the
    /// state actually changes. Returns true on a change.
    pub fn set(&mut self, kind: AlarmKind, alarmed: bool, now_ms: u64) -> bool {
        let state = &mut self.states[kind as usize];
        if state.alarmed == alarmed {
            return false;
        }
        state.alarmed = alarmed;
        state.since_ms = now_ms;
        true
    }

    /// Milliseconds since `kind` last changed state.
    pub fn time_in_state(&self, kind: AlarmKind, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.states[kind as usize].since_ms)
    }

    /// Clear every alarm without touching the transition times.
    pub fn clear_all(&mut self) {
        for state in &mut self.states {
            state.alarmed = false;
        }
    }

    #[inline]
    pub fn is_alarmed(&self, kind: AlarmKind) -> bool {
        self.states[kind as usize].alarmed
    }

    #[inline]
    pub fn is_any_alarmed(&self) -> bool {
        self.states.iter().any(|s| s.alarmed)
    }

    /// Highest-priority active alarm, if any.
    pub fn highest_priority(&self) -> Option<AlarmKind> {
        AlarmKind::ALL.into_iter().find(|&k| self.is_alarmed(k))
    }

    /// Active alarms as a bitmask.
    pub fn active(&self) -> AlarmSet {
        AlarmKind::ALL
            .into_iter()
            .filter(|&k| self.is_alarmed(k))
            .fold(AlarmSet::empty(), |acc, k| acc | k.flag())
    }
}

// ─── Evaluator ──────────────────────────────────────────────────────

/// Snapshot consumed by [`AlarmEvaluator::evaluate`].
#[derive(Debug, Clone, Copy)]
pub struct AlarmInputs {
    pub ventilator: VentilatorTelemetry,
    pub last_trip_cause: Option<TripCause>,
    pub servo_faults: ServoFaults,
}

/// Derives the alarm set from ventilator and servo telemetry.
#[derive(Debug, Clone)]
pub struct AlarmEvaluator {
    config: AlarmConfig,
    /// Interlock trip count at the previous evaluation.
    seen_trips: u32,
    /// Breath count when the latest current-caused trip was seen.
    current_trip_breath: Option<u32>,
}

impl AlarmEvaluator {
    pub fn new(config: &AlarmConfig) -> Self {
        Self {
            config: *config,
            seen_trips: 0,
            current_trip_breath: None,
        }
    }

    /// Drop the current-trip latch.
    pub fn clear_latches(&mut self) {
        self.current_trip_breath = None;
    }

    /// Evaluate all derived alarms. LOSS_OF_POWER is left untouched.
    pub fn evaluate(&mut self, alarms: &mut Alarms, inputs: &AlarmInputs, now_ms: u64) {
        let v = &inputs.ventilator;

        let over_pressure =
            v.peak_pressure >= v.peak_pressure_limit || v.pressure >= v.peak_pressure_limit;

        let under_pressure = self.config.under_pressure_enabled
            && v.operational
            && v.breath_count >= 2
            && v.peak_pressure < self.config.under_pressure_limit;

        let new_trip = v.interlock_trips != self.seen_trips;
        self.seen_trips = v.interlock_trips;
        if new_trip && inputs.last_trip_cause == Some(TripCause::OverCurrent) {
            self.current_trip_breath = Some(v.breath_count);
        }
        // The tripped breath completes at the next inspiration; the one
        // after that is the first full breath without the trip.
        if self
            .current_trip_breath
            .is_some_and(|breath| v.breath_count >= breath.saturating_add(2))
        {
            self.current_trip_breath = None;
        }
        let over_current = inputs.servo_faults.contains(ServoFaults::OVERCURRENT)
            || self.current_trip_breath.is_some();

        let motion_fault = inputs.servo_faults.has_motion_fault();

        Self::apply(alarms, AlarmKind::OverPressure, over_pressure, now_ms);
        Self::apply(alarms, AlarmKind::UnderPressure, under_pressure, now_ms);
        Self::apply(alarms, AlarmKind::OverCurrent, over_current, now_ms);
        Self::apply(alarms, AlarmKind::MotionFault, motion_fault, now_ms);
    }

    fn apply(alarms: &mut Alarms, kind: AlarmKind, alarmed: bool, now_ms: u64) {
        if alarms.set(kind, alarmed, now_ms) {
            if alarmed {
                warn!(alarm = ?kind, now_ms, "alarm raised");
            } else {
                info!(alarm = ?kind, now_ms, "alarm cleared");
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
