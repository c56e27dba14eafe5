//! First-order geared DC motor with a quantising quadrature encoder and a
//! home limit switch at the bottom of travel.
//!
//! ```text
//! dω/dt = (u·ω_max·(1 − load) − ω) / τ
//! i     = I_stall · (u − ω/ω_max) + load·I_stall
//! ```
//!
//! All quantities are at the output shaft.

/// Motor model parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorParams {
    /// Free-running output speed at full duty [rad/s].
    pub max_speed: f64,
    /// Mechanical time constant [s].
    pub time_constant_s: f64,
    /// Stall current at full duty [A].
    pub stall_current_a: f64,
    /// Encoder counts per output radian.
    pub counts_per_rad: f64,
    /// Mechanical end stop below the home switch [rad].
    pub hard_stop_rad: f64,
    /// Arm angle at power-on [rad].
    pub initial_angle_rad: f64,
}

impl Default for MotorParams {
    fn default() -> Self {
        Self {
            max_speed: 3.14,
            time_constant_s: 0.03,
            stall_current_a: 9.2,
            counts_per_rad: 28.0 * 188.0 / core::f64::consts::TAU,
            hard_stop_rad: -0.05,
            initial_angle_rad: 0.3,
        }
    }
}

/// Motor, encoder counter and home switch state.
#[derive(Debug, Clone)]
pub struct MotorModel {
    params: MotorParams,
    duty: f64,
    omega: f64,
    angle: f64,
    current: f64,
    /// Counter value at the last read.
    read_count: i64,
}

impl MotorModel {
    pub fn new(params: MotorParams) -> Self {
        Self {
            params,
            duty: 0.0,
            omega: 0.0,
            angle: params.initial_angle_rad,
            current: 0.0,
            read_count: 0,
        }
    }

    /// Advance the model by `dt` seconds against a load fraction in `[0, 1]`.
    pub fn step(&mut self, dt: f64, load: f64) {
        let p = &self.params;
        let load = load.clamp(0.0, 1.0);
        if p.time_constant_s > 0.0 {
            let drive = self.duty * p.max_speed * (1.0 - load);
            self.omega += (drive - self.omega) / p.time_constant_s * dt;
        }
        self.angle += self.omega * dt;
        if self.angle < p.hard_stop_rad {
            self.angle = p.hard_stop_rad;
            self.omega = self.omega.max(0.0);
        }

        let back_emf = if p.max_speed > 0.0 {
            self.omega / p.max_speed
        } else {
            0.0
        };
        self.current = p.stall_current_a * (self.duty - back_emf) + load * p.stall_current_a;
    }

    #[inline]
    pub fn set_duty(&mut self, duty: f64) {
        self.duty = duty.clamp(-1.0, 1.0);
    }

    #[inline]
    pub fn duty(&self) -> f64 {
        self.duty
    }

    #[inline]
    pub fn current(&self) -> f64 {
        self.current
    }

    /// Output shaft angle [rad].
    #[inline]
    pub fn angle(&self) -> f64 {
        self.angle
    }

    #[inline]
    pub fn speed(&self) -> f64 {
        self.omega
    }

    /// Quantised encoder counter.
    #[inline]
    pub fn count(&self) -> i64 {
        (self.angle * self.params.counts_per_rad).floor() as i64
    }

    /// Counts since the previous read.
    pub fn read_delta(&mut self) -> i32 {
        let now = self.count();
        let delta = now - self.read_count;
        self.read_count = now;
        i32::try_from(delta).unwrap_or(if delta > 0 { i32::MAX } else { i32::MIN })
    }

    pub fn reset_reference(&mut self) {
        self.read_count = self.count();
    }

    /// Home switch: closed at or below zero angle.
    #[inline]
    pub fn at_home(&self) -> bool {
        self.angle <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_duty_approaches_max_speed() {
        let mut m = MotorModel::new(MotorParams::default());
        m.set_duty(1.0);
        for _ in 0..1000 {
            m.step(0.001, 0.0);
        }
        assert!((m.speed() - 3.14).abs() < 0.01);
        assert!(m.current().abs() < 0.1);
    }

    #[test]
    fn stalled_motor_draws_stall_current() {
        let mut m = MotorModel::new(MotorParams::default());
        m.set_duty(1.0);
        m.step(0.001, 1.0);
        assert!((m.current() - 2.0 * 9.2).abs() < 0.5);
        assert!(m.speed().abs() < 1e-9);
    }

    #[test]
    fn hard_stop_and_home_switch() {
        let mut m = MotorModel::new(MotorParams::default());
        assert!(!m.at_home());
        m.set_duty(-1.0);
        for _ in 0..2000 {
            m.step(0.001, 0.0);
        }
        assert!(m.at_home());
        assert_eq!(m.angle(), -0.05);
    }

    #[test]
    fn encoder_delta_and_reference() {
        let mut m = MotorModel::new(MotorParams::default());
        m.reset_reference();
        assert_eq!(m.read_delta(), 0);
        m.set_duty(0.5);
        for _ in 0..100 {
            m.step(0.001, 0.0);
        }
        let d = m.read_delta();
        assert!(d > 0);
        assert_eq!(m.read_delta(), 0);
    }
}
