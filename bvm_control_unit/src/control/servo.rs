//! Fault-aware servo loop for the geared DC motor.
//!
//! ## Per-tick pipeline
//!
//! ```text
//! encoder Δ ──► raw count ──► IIR ──► position [rad]
//!          └──► Δ / dt ─────► IIR ──► velocity [rad/s]
//! driver current ───────────► IIR ──► current [A]
//!
//! fault detectors (debounced, latching)
//!
//! POSITION: target_pos ─► IIR ─► clamp ─► pos PID ─► target_velocity
//! VELOCITY: target_velocity ─► IIR ─► clamp ─► vel PID ─► clamp ─► driver
//! ```
//!
//! Any latched fault forces the driver output to zero on every tick until
//! [`ServoAxis::reset`] clears the fault state.

use bvm_common::control_unit::config::{MotorConfig, Range, ServoConfig};
use bvm_common::control_unit::error::ServoFaults;
use bvm_common::control_unit::state::ServoMode;
use bvm_common::control_unit::telemetry::ServoTelemetry;
use bvm_common::hal::{Encoder, LimitSwitch, MotorDriver};
use tracing::error;

use super::debounce::DebouncedPredicate;
use super::filters::{LowPassState, lowpass_apply, signof};
use super::pid::Pid;

// ─── Axis Interface ─────────────────────────────────────────────────

/// The servo capabilities used by the sequencers (homing, respiration).
///
/// Sequencers take `&mut impl ServoAxis` per call instead of holding a
/// reference to the motor.
pub trait ServoAxis {
    fn set_mode(&mut self, mode: ServoMode);
    fn mode(&self) -> ServoMode;

    /// Target position [rad], used in POSITION mode.
    fn set_pos(&mut self, rad: f64);
    /// Target velocity [rad/s], used in VELOCITY mode.
    fn set_velocity(&mut self, rad_per_s: f64);

    /// Filtered position [rad].
    fn position(&self) -> f64;
    /// Filtered velocity [rad/s].
    fn velocity(&self) -> f64;
    /// Filtered motor current [A].
    fn current(&self) -> f64;
    fn faults(&self) -> ServoFaults;

    fn limit_switch_asserted(&self) -> bool;

    /// Make the current position the zero reference.
    fn zero(&mut self);
    /// Clear both control loops and all fault state.
    fn reset(&mut self);

    #[inline]
    fn set_pos_deg(&mut self, deg: f64) {
        self.set_pos(deg.to_radians());
    }

    #[inline]
    fn position_deg(&self) -> f64 {
        self.position().to_degrees()
    }
}

// ─── Fault Detectors ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct FaultDetectors {
    no_encoder: DebouncedPredicate,
    wrong_direction: DebouncedPredicate,
    overcurrent: DebouncedPredicate,
    position_error: DebouncedPredicate,
    driver_fault: DebouncedPredicate,
}

impl FaultDetectors {
    fn new(config: &ServoConfig) -> Self {
        let f = &config.faults;
        Self {
            no_encoder: DebouncedPredicate::new(f.no_encoder_ticks),
            wrong_direction: DebouncedPredicate::new(f.wrong_direction_ticks),
            overcurrent: DebouncedPredicate::new(f.overcurrent_ticks),
            position_error: DebouncedPredicate::new(f.excessive_position_error_ticks),
            driver_fault: DebouncedPredicate::new(f.driver_fault_ticks),
        }
    }

    fn reset(&mut self) {
        self.no_encoder.reset();
        self.wrong_direction.reset();
        self.overcurrent.reset();
        self.position_error.reset();
        self.driver_fault.reset();
    }
}

// ─── Servo ──────────────────────────────────────────────────────────

/// Cascaded position/velocity servo over a driver, encoder and home switch.
#[derive(Debug)]
pub struct Servo<D, E, L> {
    config: ServoConfig,
    counts_per_rad: f64,
    inverted: bool,
    /// Update period [s].
    period: f64,

    driver: D,
    encoder: E,
    limit_switch: L,

    mode: ServoMode,
    vel_pid: Pid,
    pos_pid: Pid,

    /// Encoder counts accumulated since the last zero.
    raw_count: i64,
    position: LowPassState,
    velocity: LowPassState,
    current: LowPassState,

    target_pos: f64,
    target_velocity: f64,
    commanded_pos: LowPassState,
    commanded_velocity: LowPassState,
    command: f64,

    faults: ServoFaults,
    detectors: FaultDetectors,
}

impl<D: MotorDriver, E: Encoder, L: LimitSwitch> Servo<D, E, L> {
    /// Build a servo updating every `period_s` seconds.
    pub fn new(
        config: &ServoConfig,
        motor: &MotorConfig,
        period_s: f64,
        driver: D,
        encoder: E,
        limit_switch: L,
    ) -> Self {
        Self {
            config: *config,
            counts_per_rad: motor.counts_per_output_rad(),
            inverted: motor.inverted,
            period: period_s,
            driver,
            encoder,
            limit_switch,
            mode: ServoMode::Off,
            vel_pid: Pid::new(config.vel_pid, period_s),
            pos_pid: Pid::new(config.pos_pid, period_s),
            raw_count: 0,
            position: LowPassState::default(),
            velocity: LowPassState::default(),
            current: LowPassState::default(),
            target_pos: 0.0,
            target_velocity: 0.0,
            commanded_pos: LowPassState::default(),
            commanded_velocity: LowPassState::default(),
            command: 0.0,
            faults: ServoFaults::empty(),
            detectors: FaultDetectors::new(config),
        }
    }

    /// Zero the encoder, de-energize the driver and clear all loop state:
    /// measurement and target filters, both PIDs and the fault latches.
    pub fn init(&mut self) {
        self.encoder.reset_reference();
        self.command = 0.0;
        self.driver.set_output(0.0);
        self.velocity.reset();
        self.current.reset();
        self.target_velocity = 0.0;
        self.commanded_velocity.reset();
        self.zero();
    }

    /// One control tick.
    pub fn update(&mut self) {
        let mut delta = self.encoder.delta_since_last_read();
        if self.inverted {
            delta = -delta;
        }
        self.raw_count += i64::from(delta);

        let raw_pos = self.counts_to_rad(self.raw_count as f64);
        lowpass_apply(&mut self.position, self.config.position_filter_alpha, raw_pos);

        let raw_vel = if self.period > 0.0 {
            self.counts_to_rad(f64::from(delta)) / self.period
        } else {
            0.0
        };
        lowpass_apply(&mut self.velocity, self.config.velocity_filter_alpha, raw_vel);
        lowpass_apply(
            &mut self.current,
            self.config.current_filter_alpha,
            self.driver.measured_current(),
        );

        self.detect_faults(delta);

        if self.faults.is_faulted() {
            self.command = 0.0;
            self.driver.set_output(0.0);
            return;
        }

        if self.mode == ServoMode::Position {
            let pos = lowpass_apply(
                &mut self.commanded_pos,
                self.config.target_filter_alpha,
                self.target_pos,
            );
            let pos = self.config.pos_limits.saturate(pos);
            self.commanded_pos.set(pos);
            self.target_velocity = self.pos_pid.update(pos, self.position.output());
        }

        match self.mode {
            ServoMode::Off => {
                self.command = 0.0;
            }
            ServoMode::Velocity | ServoMode::Position => {
                let vel = lowpass_apply(
                    &mut self.commanded_velocity,
                    self.config.target_filter_alpha,
                    self.target_velocity,
                );
                let vel = self.config.vel_limits.saturate(vel);
                self.commanded_velocity.set(vel);

                let limit = Range::new(-self.config.output_limit, self.config.output_limit);
                let mut command = limit.saturate(self.vel_pid.update(vel, self.velocity.output()));

                // Travel into the home switch is inhibited; travel away is not.
                if self.limit_switch.is_asserted() && command < 0.0 {
                    command = 0.0;
                }
                self.command = command;
            }
        }

        let out = if self.inverted { -self.command } else { self.command };
        self.driver.set_output(out);
    }

    fn detect_faults(&mut self, delta: i32) {
        let f = self.config.faults;
        let position = self.position.output();
        let velocity = self.velocity.output();
        let current = self.current.output();

        let no_encoder = f.no_encoder_enabled
            && self
                .detectors
                .no_encoder
                .update(delta == 0 && self.command.abs() > f.no_encoder_command_threshold);
        self.latch(no_encoder, ServoFaults::NO_ENCODER);

        let wrong_direction = f.wrong_direction_enabled
            && self.detectors.wrong_direction.update(
                signof(velocity) != signof(self.target_velocity)
                    && (self.target_velocity - velocity).abs() > f.wrong_direction_velocity_gap,
            );
        self.latch(wrong_direction, ServoFaults::WRONG_DIRECTION);

        let overcurrent = f.overcurrent_enabled
            && self
                .detectors
                .overcurrent
                .update(current.abs() >= f.overcurrent_threshold_a);
        self.latch(overcurrent, ServoFaults::OVERCURRENT);

        let position_error = f.excessive_position_error_enabled
            && self.detectors.position_error.update(
                self.mode == ServoMode::Position
                    && (self.target_pos - position).abs() > f.excessive_position_error_rad,
            );
        self.latch(position_error, ServoFaults::EXCESSIVE_POSITION_ERROR);

        let driver_fault =
            f.driver_fault_enabled && self.detectors.driver_fault.update(self.driver.fault());
        self.latch(driver_fault, ServoFaults::DRIVER_FAULT);
    }

    fn latch(&mut self, tripped: bool, fault: ServoFaults) {
        if tripped && !self.faults.contains(fault) {
            self.faults.insert(fault);
            error!(
                fault = ?fault,
                position = self.position.output(),
                velocity = self.velocity.output(),
                current = self.current.output(),
                "servo fault latched"
            );
        }
    }

    #[inline]
    fn counts_to_rad(&self, counts: f64) -> f64 {
        if self.counts_per_rad > 0.0 {
            counts / self.counts_per_rad
        } else {
            0.0
        }
    }

    /// Last command sent to the driver, before inversion.
    #[inline]
    pub fn command(&self) -> f64 {
        self.command
    }

    #[inline]
    pub fn target_position(&self) -> f64 {
        self.target_pos
    }

    #[inline]
    pub fn target_velocity(&self) -> f64 {
        self.target_velocity
    }

    pub fn telemetry(&self) -> ServoTelemetry {
        ServoTelemetry {
            mode: self.mode,
            position: self.position.output(),
            velocity: self.velocity.output(),
            current: self.current.output(),
            command: self.command,
            target_position: self.target_pos,
            target_velocity: self.target_velocity,
            faults: self.faults.bits(),
        }
    }

    #[inline]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    #[inline]
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    #[inline]
    pub fn encoder_mut(&mut self) -> &mut E {
        &mut self.encoder
    }

    #[inline]
    pub fn limit_switch_mut(&mut self) -> &mut L {
        &mut self.limit_switch
    }
}

impl<D: MotorDriver, E: Encoder, L: LimitSwitch> ServoAxis for Servo<D, E, L> {
    #[inline]
    fn set_mode(&mut self, mode: ServoMode) {
        self.mode = mode;
    }

    #[inline]
    fn mode(&self) -> ServoMode {
        self.mode
    }

    #[inline]
    fn set_pos(&mut self, rad: f64) {
        self.target_pos = rad;
    }

    #[inline]
    fn set_velocity(&mut self, rad_per_s: f64) {
        self.target_velocity = rad_per_s;
    }

    #[inline]
    fn position(&self) -> f64 {
        self.position.output()
    }

    #[inline]
    fn velocity(&self) -> f64 {
        self.velocity.output()
    }

    #[inline]
    fn current(&self) -> f64 {
        self.current.output()
    }

    #[inline]
    fn faults(&self) -> ServoFaults {
        self.faults
    }

    #[inline]
    fn limit_switch_asserted(&self) -> bool {
        self.limit_switch.is_asserted()
    }

    fn zero(&mut self) {
        self.raw_count = 0;
        self.position.reset();
        self.target_pos = 0.0;
        self.commanded_pos.reset();
        self.encoder.reset_reference();
        ServoAxis::reset(self);
    }

    fn reset(&mut self) {
        self.vel_pid.reset();
        self.pos_pid.reset();
        self.faults = ServoFaults::empty();
        self.detectors.reset();
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
