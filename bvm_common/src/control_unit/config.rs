//! Configuration structures for the ventilator control core.
//!
//! All config types use `serde::Deserialize` for TOML loading. Every section
//! is `#[serde(default)]`, so an empty document yields the reference hardware
//! configuration (GoBilda 188:1 gearmotor with a 28 CPR encoder, I:E = 1:2).
//! Semantic validation lives in the control unit's config loader.

use core::f64::consts::FRAC_PI_2;

use heapless::Vec as HVec;
use serde::{Deserialize, Serialize};

use crate::config::SharedConfig;
use crate::consts::{CONTROL_PERIOD_MS, MAX_SETTINGS, SERVO_PERIOD_MS, UI_PERIOD_MS};

/// Fixed-capacity setting table (tidal-volume positions or breath rates).
pub type SettingTable = HVec<f64, MAX_SETTINGS>;

/// Build a [`SettingTable`] from a slice, dropping entries beyond capacity.
pub fn setting_table(values: &[f64]) -> SettingTable {
    let mut table = SettingTable::new();
    for &v in values.iter().take(MAX_SETTINGS) {
        let _ = table.push(v);
    }
    table
}

// ─── Shared numeric helpers ─────────────────────────────────────────

/// Closed interval used for velocity/position limits and display ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamp `value` into `[min, max]`.
    #[inline]
    pub fn saturate(&self, value: f64) -> f64 {
        if value < self.min {
            self.min
        } else if value > self.max {
            self.max
        } else {
            value
        }
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    #[inline]
    pub fn is_ordered(&self) -> bool {
        self.min <= self.max
    }
}

/// PID gains. Immutable after construction of the owning loop.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PidParams {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl PidParams {
    pub const fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }
}

/// Inspiration : expiration ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IeRatio {
    pub inspiration: f64,
    pub expiration: f64,
}

impl Default for IeRatio {
    fn default() -> Self {
        Self {
            inspiration: 1.0,
            expiration: 2.0,
        }
    }
}

impl IeRatio {
    /// Fraction of the breath period spent in inspiration.
    #[inline]
    pub fn inspiration_fraction(&self) -> f64 {
        let total = self.inspiration + self.expiration;
        if total > 0.0 { self.inspiration / total } else { 0.0 }
    }

    /// Fraction of the breath period spent in expiration.
    #[inline]
    pub fn expiration_fraction(&self) -> f64 {
        let total = self.inspiration + self.expiration;
        if total > 0.0 { self.expiration / total } else { 0.0 }
    }
}

// ─── Top-Level Config ───────────────────────────────────────────────

/// Complete control core configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BvmConfig {
    pub shared: SharedConfig,
    pub timing: TimingConfig,
    pub motor: MotorConfig,
    pub servo: ServoConfig,
    pub planner: PlannerConfig,
    pub motion: MotionConfig,
    pub respiration: RespirationConfig,
    pub homing: HomingConfig,
    pub alarms: AlarmConfig,
}

/// Scheduler tick periods.
///
/// `control_period_ms` and `ui_period_ms` must be integer multiples of
/// `servo_period_ms`; the scheduler runs on the servo period as its base tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Fast tick: servo control loop.
    pub servo_period_ms: u32,
    /// Medium tick: pressure sampling, homing and respiration sequencing.
    pub control_period_ms: u32,
    /// Slow tick: alarm evaluation and telemetry.
    pub ui_period_ms: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            servo_period_ms: SERVO_PERIOD_MS,
            control_period_ms: CONTROL_PERIOD_MS,
            ui_period_ms: UI_PERIOD_MS,
        }
    }
}

impl TimingConfig {
    /// Base ticks per medium tick (at least 1).
    #[inline]
    pub fn control_divider(&self) -> u64 {
        divider(self.control_period_ms, self.servo_period_ms)
    }

    /// Base ticks per slow tick (at least 1).
    #[inline]
    pub fn ui_divider(&self) -> u64 {
        divider(self.ui_period_ms, self.servo_period_ms)
    }
}

fn divider(period: u32, base: u32) -> u64 {
    if base == 0 {
        1
    } else {
        u64::from((period / base).max(1))
    }
}

/// Gearmotor parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorConfig {
    /// Gear reduction, X : 1.
    pub gear_reduction: f64,
    /// Countable encoder events per revolution of the input shaft.
    pub counts_per_rev: f64,
    /// Negate encoder delta and actuator command.
    pub inverted: bool,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            gear_reduction: 188.0,
            counts_per_rev: 28.0,
            inverted: false,
        }
    }
}

impl MotorConfig {
    /// Encoder counts per radian at the output shaft.
    #[inline]
    pub fn counts_per_output_rad(&self) -> f64 {
        self.counts_per_rev * self.gear_reduction / core::f64::consts::TAU
    }
}

/// Servo loop configuration: gains, limits, filter coefficients, fault checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoConfig {
    /// Velocity loop gains (rad/s error → normalized duty).
    pub vel_pid: PidParams,
    /// Position loop gains (rad error → rad/s target).
    pub pos_pid: PidParams,
    /// Commanded velocity limits [rad/s].
    pub vel_limits: Range,
    /// Commanded position limits [rad].
    pub pos_limits: Range,
    /// Weight of the new raw sample in the position IIR filter.
    pub position_filter_alpha: f64,
    /// Weight of the new raw sample in the velocity IIR filter.
    pub velocity_filter_alpha: f64,
    /// Weight of the new raw sample in the current IIR filter.
    pub current_filter_alpha: f64,
    /// Weight of the new target in the target position/velocity filters.
    pub target_filter_alpha: f64,
    /// Maximum magnitude of the duty cycle sent to the driver.
    pub output_limit: f64,
    pub faults: FaultConfig,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            vel_pid: PidParams::new(3.0, 0.2, 0.0),
            pos_pid: PidParams::new(16.0, 0.4, 0.0),
            vel_limits: Range::new(-3.0, 3.0),
            pos_limits: Range::new(-0.1, 1.75),
            position_filter_alpha: 0.1,
            velocity_filter_alpha: 0.02,
            current_filter_alpha: 0.01,
            target_filter_alpha: 0.9,
            output_limit: 1.0,
            faults: FaultConfig::default(),
        }
    }
}

/// Per-detector fault configuration.
///
/// Each detector latches once its condition has held for more than
/// `*_ticks` consecutive servo ticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultConfig {
    pub no_encoder_enabled: bool,
    /// |command| above which a zero encoder delta counts as suspicious.
    pub no_encoder_command_threshold: f64,
    pub no_encoder_ticks: u32,

    pub wrong_direction_enabled: bool,
    /// |target − measured| velocity gap [rad/s] above which a sign mismatch counts.
    pub wrong_direction_velocity_gap: f64,
    pub wrong_direction_ticks: u32,

    pub overcurrent_enabled: bool,
    /// Filtered current threshold [A].
    pub overcurrent_threshold_a: f64,
    pub overcurrent_ticks: u32,

    /// Disabled on the reference hardware.
    pub excessive_position_error_enabled: bool,
    /// Position error [rad] in POSITION mode.
    pub excessive_position_error_rad: f64,
    pub excessive_position_error_ticks: u32,

    pub driver_fault_enabled: bool,
    pub driver_fault_ticks: u32,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            no_encoder_enabled: true,
            no_encoder_command_threshold: 0.5,
            no_encoder_ticks: 500,
            wrong_direction_enabled: true,
            wrong_direction_velocity_gap: 1.4,
            wrong_direction_ticks: 1000,
            overcurrent_enabled: true,
            overcurrent_threshold_a: 5.0,
            overcurrent_ticks: 200,
            excessive_position_error_enabled: false,
            excessive_position_error_rad: FRAC_PI_2,
            excessive_position_error_ticks: 0,
            driver_fault_enabled: true,
            driver_fault_ticks: 10,
        }
    }
}

/// Trapezoidal profile shape as fractions of the segment duration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub t_a_percent: f64,
    pub t_d_percent: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            t_a_percent: 0.5,
            t_d_percent: 0.5,
        }
    }
}

/// Arm geometry in degrees at the output shaft.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Parking position while not ventilating.
    pub idle_pos_deg: f64,
    /// Position where the arm just touches the bag.
    pub open_pos_deg: f64,
    pub min_closed_pos_deg: f64,
    pub max_closed_pos_deg: f64,
    pub ie_ratio: IeRatio,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            idle_pos_deg: 1.0,
            open_pos_deg: 35.0,
            min_closed_pos_deg: 40.0,
            max_closed_pos_deg: 95.0,
            ie_ratio: IeRatio::default(),
        }
    }
}

/// Respiration sequencing and pressure-safety parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RespirationConfig {
    /// Duration of the slow moves to the idle and open positions.
    pub time_to_idle_ms: u32,
    /// Inspiratory hold duration on plateau-measurement cycles.
    pub plateau_time_ms: u32,
    /// Duration of an interlock-triggered opening.
    pub fast_open_time_ms: u32,
    /// Every Nth breath measures plateau pressure; 0 disables.
    pub plateau_measurement_interval: u32,
    /// Closed arm positions [deg], one per tidal-volume setting.
    pub tidal_volume_settings: SettingTable,
    /// Breath rates [breaths/min].
    pub rate_settings: SettingTable,
    /// Initial peak pressure limit [cmH2O].
    pub default_peak_pressure_limit: f64,
    pub peak_pressure_display: Range,
    pub plateau_pressure_display: Range,
    /// Step applied by one press of the limit adjust buttons.
    pub peak_pressure_limit_increment: f64,
    /// Weight of the new raw sample in the pressure filter.
    pub pressure_filter_alpha: f64,
    /// Absolute motor current [A] that trips the interlock.
    pub max_motor_current_a: f64,
}

impl Default for RespirationConfig {
    fn default() -> Self {
        Self {
            time_to_idle_ms: 3000,
            plateau_time_ms: 250,
            fast_open_time_ms: 200,
            plateau_measurement_interval: 0,
            tidal_volume_settings: setting_table(&[55.0, 62.0, 69.0, 76.0, 83.0, 90.0]),
            rate_settings: setting_table(&[8.0, 10.0, 12.0, 14.0, 16.0, 18.0]),
            default_peak_pressure_limit: 40.0,
            peak_pressure_display: Range::new(10.0, 60.0),
            plateau_pressure_display: Range::new(5.0, 40.0),
            peak_pressure_limit_increment: 2.0,
            pressure_filter_alpha: 0.5,
            max_motor_current_a: 4.0,
        }
    }
}

/// Homing velocities at the output shaft [rad/s].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomingConfig {
    /// Approach velocity toward the home switch (negative).
    pub homing_velocity: f64,
    /// Backoff velocity away from the switch (positive).
    pub backoff_velocity: f64,
}

impl Default for HomingConfig {
    fn default() -> Self {
        Self {
            homing_velocity: -0.6,
            backoff_velocity: 0.2,
        }
    }
}

/// Alarm thresholds evaluated on the slow tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    pub under_pressure_enabled: bool,
    /// Peak pressure [cmH2O] below which a completed breath raises UNDER_PRESSURE.
    pub under_pressure_limit: f64,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            under_pressure_enabled: true,
            under_pressure_limit: 5.0,
        }
    }
}
