//! Hardware capability traits consumed by the control core.
//!
//! The core drives hardware exclusively through these narrow interfaces.
//! Concrete drivers (PWM bridge, timer-based quadrature counter, ADC
//! front end) live outside the core; the control unit crate ships a
//! simulated implementation of each.
//!
//! # Timing Contracts
//!
//! Every method is called from a fixed-period tick and must return in
//! bounded time without blocking.

/// Actuator driver (PWM bridge with current sense).
pub trait MotorDriver {
    /// Apply a signed normalized duty cycle in `[-1.0, 1.0]`.
    fn set_output(&mut self, duty: f64);

    /// Measured motor current [A].
    fn measured_current(&self) -> f64;

    /// Driver-reported fault line.
    fn fault(&self) -> bool;
}

/// Quadrature position encoder.
pub trait Encoder {
    /// Signed count delta since the previous call.
    fn delta_since_last_read(&mut self) -> i32;

    /// Re-zero the hardware counter.
    fn reset_reference(&mut self);
}

/// Limit / home switch.
pub trait LimitSwitch {
    /// True while the switch is pressed.
    fn is_asserted(&self) -> bool;
}

/// Airway pressure sensor, already converted to engineering units.
pub trait PressureSensor {
    /// Latest reading [cmH2O].
    fn read(&mut self) -> f64;
}
