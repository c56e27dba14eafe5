//! Telemetry snapshots handed to the UI, serial and logging collaborators.

use serde::{Deserialize, Serialize};

use super::state::{HomingState, ServoMode, VentilatorState};

/// Servo loop telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ServoTelemetry {
    pub mode: ServoMode,
    /// Filtered output shaft position [rad].
    pub position: f64,
    /// Filtered output shaft velocity [rad/s].
    pub velocity: f64,
    /// Filtered motor current [A].
    pub current: f64,
    /// Last duty command sent to the driver.
    pub command: f64,
    pub target_position: f64,
    pub target_velocity: f64,
    /// Latched `ServoFaults` bits.
    pub faults: u8,
}

/// Respiration telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VentilatorTelemetry {
    pub state: VentilatorState,
    pub operational: bool,
    /// Filtered airway pressure [cmH2O].
    pub pressure: f64,
    /// Peak pressure of the last completed breath.
    pub peak_pressure: f64,
    /// Plateau pressure of the last measurement cycle.
    pub plateau_pressure: f64,
    pub peak_pressure_limit: f64,
    /// Selected (pending) tidal-volume index.
    pub tv_idx: u8,
    /// Selected (pending) rate index.
    pub rate_idx: u8,
    pub breath_count: u32,
    pub interlock_trips: u32,
    /// Non-finite pressure samples discarded.
    pub rejected_pressure_samples: u32,
}

/// One slow-tick snapshot of the whole core.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CoreTelemetry {
    /// Tick-derived time [ms].
    pub time_ms: u64,
    pub homing: HomingState,
    pub servo: ServoTelemetry,
    pub ventilator: VentilatorTelemetry,
    /// Active alarm bitmask, bit index = alarm priority.
    pub alarms: u8,
}
