//! TOML configuration loader with validation.
//!
//! Loads a single [`BvmConfig`] document and checks the cross-field rules
//! the control core relies on: tick periods that divide evenly, a planner
//! profile that fits its segment, setting tables inside the mechanical
//! envelope, and safety timings that fit inside the shortest expiration.

use std::path::Path;

use bvm_common::config::{ConfigError, ConfigLoader};
use bvm_common::consts::bpm_to_period_ms;
use bvm_common::control_unit::config::{
    BvmConfig, HomingConfig, MotionConfig, MotorConfig, PlannerConfig, Range,
    RespirationConfig, ServoConfig, TimingConfig,
};
use tracing::debug;

// ─── Loading Functions ──────────────────────────────────────────────

/// Load and validate the configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<BvmConfig, ConfigError> {
    let config = BvmConfig::load(path)?;
    validate_config(&config)?;
    debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}

/// Load config from a TOML string (for testing).
pub fn load_config_from_str(toml: &str) -> Result<BvmConfig, ConfigError> {
    let config = BvmConfig::from_toml(toml)?;
    validate_config(&config)?;
    Ok(config)
}

// ─── Validation ─────────────────────────────────────────────────────

/// Run every validation rule against an already-parsed configuration.
pub fn validate_config(config: &BvmConfig) -> Result<(), ConfigError> {
    config.shared.validate()?;
    validate_timing(&config.timing)?;
    validate_motor(&config.motor)?;
    validate_servo(&config.servo)?;
    validate_planner(&config.planner)?;
    validate_motion(&config.motion)?;
    validate_respiration(&config.respiration, &config.motion)?;
    validate_homing(&config.homing)?;
    Ok(())
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}

fn check_ordered(name: &str, range: &Range) -> Result<(), ConfigError> {
    if !range.is_ordered() {
        return Err(invalid(format!(
            "{name}: min {} > max {}",
            range.min, range.max
        )));
    }
    Ok(())
}

fn check_fraction(name: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(format!("{name} = {value} outside [0, 1]")));
    }
    Ok(())
}

fn check_positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if !(value > 0.0) {
        return Err(invalid(format!("{name} = {value} must be positive")));
    }
    Ok(())
}

fn validate_timing(timing: &TimingConfig) -> Result<(), ConfigError> {
    let TimingConfig {
        servo_period_ms,
        control_period_ms,
        ui_period_ms,
    } = *timing;

    if servo_period_ms == 0 || control_period_ms == 0 || ui_period_ms == 0 {
        return Err(invalid("tick periods must be non-zero"));
    }
    if control_period_ms % servo_period_ms != 0 {
        return Err(invalid(format!(
            "control_period_ms {control_period_ms} is not a multiple of servo_period_ms {servo_period_ms}"
        )));
    }
    if ui_period_ms % servo_period_ms != 0 {
        return Err(invalid(format!(
            "ui_period_ms {ui_period_ms} is not a multiple of servo_period_ms {servo_period_ms}"
        )));
    }
    Ok(())
}

fn validate_motor(motor: &MotorConfig) -> Result<(), ConfigError> {
    check_positive("motor.gear_reduction", motor.gear_reduction)?;
    check_positive("motor.counts_per_rev", motor.counts_per_rev)
}

fn validate_servo(servo: &ServoConfig) -> Result<(), ConfigError> {
    check_ordered("servo.vel_limits", &servo.vel_limits)?;
    check_ordered("servo.pos_limits", &servo.pos_limits)?;
    check_fraction("servo.position_filter_alpha", servo.position_filter_alpha)?;
    check_fraction("servo.velocity_filter_alpha", servo.velocity_filter_alpha)?;
    check_fraction("servo.current_filter_alpha", servo.current_filter_alpha)?;
    check_fraction("servo.target_filter_alpha", servo.target_filter_alpha)?;
    check_positive("servo.output_limit", servo.output_limit)?;
    check_fraction("servo.output_limit", servo.output_limit)
}

fn validate_planner(planner: &PlannerConfig) -> Result<(), ConfigError> {
    check_positive("planner.t_a_percent", planner.t_a_percent)?;
    check_positive("planner.t_d_percent", planner.t_d_percent)?;
    let sum = planner.t_a_percent + planner.t_d_percent;
    if sum > 1.0 + f64::EPSILON {
        return Err(invalid(format!(
            "planner: t_a_percent + t_d_percent = {sum} exceeds 1"
        )));
    }
    Ok(())
}

fn validate_motion(motion: &MotionConfig) -> Result<(), ConfigError> {
    if motion.min_closed_pos_deg > motion.max_closed_pos_deg {
        return Err(invalid(format!(
            "motion: min_closed_pos_deg {} > max_closed_pos_deg {}",
            motion.min_closed_pos_deg, motion.max_closed_pos_deg
        )));
    }
    if motion.idle_pos_deg > motion.open_pos_deg {
        return Err(invalid(format!(
            "motion: idle_pos_deg {} beyond open_pos_deg {}",
            motion.idle_pos_deg, motion.open_pos_deg
        )));
    }
    check_positive("motion.ie_ratio.inspiration", motion.ie_ratio.inspiration)?;
    check_positive("motion.ie_ratio.expiration", motion.ie_ratio.expiration)
}

fn validate_respiration(
    resp: &RespirationConfig,
    motion: &MotionConfig,
) -> Result<(), ConfigError> {
    if resp.tidal_volume_settings.is_empty() {
        return Err(invalid("respiration.tidal_volume_settings is empty"));
    }
    if resp.rate_settings.is_empty() {
        return Err(invalid("respiration.rate_settings is empty"));
    }

    let closed = Range::new(motion.min_closed_pos_deg, motion.max_closed_pos_deg);
    for (idx, &pos) in resp.tidal_volume_settings.iter().enumerate() {
        if !closed.contains(pos) {
            return Err(invalid(format!(
                "respiration.tidal_volume_settings[{idx}] = {pos} outside [{}, {}]",
                closed.min, closed.max
            )));
        }
    }
    for (idx, &bpm) in resp.rate_settings.iter().enumerate() {
        if !(bpm > 0.0) {
            return Err(invalid(format!(
                "respiration.rate_settings[{idx}] = {bpm} must be positive"
            )));
        }
    }

    check_ordered("respiration.peak_pressure_display", &resp.peak_pressure_display)?;
    check_ordered(
        "respiration.plateau_pressure_display",
        &resp.plateau_pressure_display,
    )?;
    if !resp
        .peak_pressure_display
        .contains(resp.default_peak_pressure_limit)
    {
        return Err(invalid(format!(
            "respiration.default_peak_pressure_limit {} outside display range [{}, {}]",
            resp.default_peak_pressure_limit,
            resp.peak_pressure_display.min,
            resp.peak_pressure_display.max
        )));
    }
    check_positive(
        "respiration.peak_pressure_limit_increment",
        resp.peak_pressure_limit_increment,
    )?;
    check_fraction("respiration.pressure_filter_alpha", resp.pressure_filter_alpha)?;
    check_positive("respiration.max_motor_current_a", resp.max_motor_current_a)?;
    if resp.time_to_idle_ms == 0 {
        return Err(invalid("respiration.time_to_idle_ms must be non-zero"));
    }

    let fastest = resp
        .rate_settings
        .iter()
        .copied()
        .fold(f64::MIN, f64::max);
    let shortest_expiration_ms = bpm_to_period_ms(fastest) * motion.ie_ratio.expiration_fraction();
    for (name, ms) in [
        ("plateau_time_ms", resp.plateau_time_ms),
        ("fast_open_time_ms", resp.fast_open_time_ms),
    ] {
        if f64::from(ms) >= shortest_expiration_ms {
            return Err(invalid(format!(
                "respiration.{name} {ms} does not fit the shortest expiration ({shortest_expiration_ms:.0} ms at {fastest} bpm)"
            )));
        }
    }
    Ok(())
}

fn validate_homing(homing: &HomingConfig) -> Result<(), ConfigError> {
    if !(homing.homing_velocity < 0.0) {
        return Err(invalid(format!(
            "homing.homing_velocity {} must be negative",
            homing.homing_velocity
        )));
    }
    check_positive("homing.backoff_velocity", homing.backoff_velocity)
}

// ─── Tests ──────────────────────────────────────────────────────────
