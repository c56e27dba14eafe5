//! Bag and patient-circuit pressure model.
//!
//! Airway pressure rises linearly with how far the arm has squeezed the bag
//! past the contact angle, scaled by an obstruction factor, and follows that
//! static value with a first-order lag.

/// Lung model parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LungParams {
    /// Pressure with the bag released [cmH2O].
    pub peep: f64,
    /// Arm angle where the bag is first compressed [deg].
    pub contact_deg: f64,
    /// Pressure rise per degree of compression [cmH2O/deg].
    pub stiffness: f64,
    /// Multiplier on `stiffness`; above 1 models an obstructed airway.
    pub obstruction: f64,
    /// Pressure lag time constant [s].
    pub time_constant_s: f64,
    /// Pressure at which the bag fully resists the arm [cmH2O].
    pub stall_pressure: f64,
}

impl Default for LungParams {
    fn default() -> Self {
        Self {
            peep: 5.0,
            contact_deg: 35.0,
            stiffness: 0.75,
            obstruction: 1.0,
            time_constant_s: 0.05,
            stall_pressure: 120.0,
        }
    }
}

/// Pressure state.
#[derive(Debug, Clone)]
pub struct LungModel {
    params: LungParams,
    pressure: f64,
}

impl LungModel {
    pub fn new(params: LungParams) -> Self {
        Self {
            params,
            pressure: params.peep,
        }
    }

    /// Static pressure for an arm angle [deg].
    pub fn static_pressure(&self, arm_deg: f64) -> f64 {
        let p = &self.params;
        let squeeze = (arm_deg - p.contact_deg).max(0.0);
        p.peep + p.stiffness * p.obstruction * squeeze
    }

    /// Advance by `dt` seconds with the arm at `arm_deg`.
    pub fn step(&mut self, dt: f64, arm_deg: f64) {
        let target = self.static_pressure(arm_deg);
        let tau = self.params.time_constant_s;
        if tau > 0.0 {
            self.pressure += (target - self.pressure) * (dt / tau).min(1.0);
        } else {
            self.pressure = target;
        }
    }

    #[inline]
    pub fn pressure(&self) -> f64 {
        self.pressure
    }

    /// Fraction of motor effort absorbed by the bag, in `[0, 1]`.
    pub fn load(&self) -> f64 {
        let p = &self.params;
        if p.stall_pressure <= p.peep {
            return 0.0;
        }
        ((self.pressure - p.peep) / (p.stall_pressure - p.peep)).clamp(0.0, 1.0)
    }

    #[inline]
    pub fn set_obstruction(&mut self, obstruction: f64) {
        self.params.obstruction = obstruction.max(0.0);
    }
}
