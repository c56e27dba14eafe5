//! Pressure / motor-current safety interlock.
//!
//! Evaluated on every sequencing tick. Filters the raw airway pressure and
//! decides whether the arm must be opened immediately. The respiration
//! controller owns one instance and performs the fast-open when a trip is
//! reported.
//!
//! A trip can be raised during every arm movement except the opening
//! (EXPIRATION). The fast-open segment itself runs as EXPIRATION, so a
//! sustained over-pressure cannot re-trigger the same opening every tick.
//! A parked arm (IDLE) is not squeezing the bag and is never tripped.
//!
//! Non-finite pressure samples are discarded: the filter holds its last
//! output so a single bad reading cannot disable the limit check.

use bvm_common::control_unit::state::VentilatorState;
use tracing::{debug, warn};

use crate::control::filters::{LowPassState, lowpass_apply_seeded};

/// What tripped the interlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripCause {
    /// Filtered pressure reached the peak-pressure limit.
    OverPressure,
    /// Absolute motor current exceeded the configured maximum.
    OverCurrent,
}

/// Pressure filter plus trip logic.
#[derive(Debug, Clone)]
pub struct PressureInterlock {
    filter: LowPassState,
    alpha: f64,
    /// Peak pressure limit [cmH2O].
    limit: f64,
    /// Absolute current limit [A].
    max_current: f64,
    trips: u32,
    last_cause: Option<TripCause>,
    /// Non-finite samples discarded since construction.
    rejected: u32,
}

impl PressureInterlock {
    pub fn new(alpha: f64, limit: f64, max_current: f64) -> Self {
        Self {
            filter: LowPassState::default(),
            alpha,
            limit,
            max_current,
            trips: 0,
            last_cause: None,
            rejected: 0,
        }
    }

    /// Feed one raw pressure sample and return the filtered pressure.
    ///
    /// The first finite sample seeds the filter. A NaN or infinite sample
    /// leaves the filter untouched and returns the held output.
    pub fn sample(&mut self, raw: f64) -> f64 {
        if !raw.is_finite() {
            if self.rejected == 0 {
                warn!(raw, held = self.filter.output(), "non-finite pressure sample discarded");
            }
            self.rejected = self.rejected.saturating_add(1);
            return self.filter.output();
        }
        lowpass_apply_seeded(&mut self.filter, self.alpha, raw)
    }

    /// Filtered pressure [cmH2O].
    #[inline]
    pub fn pressure(&self) -> f64 {
        self.filter.output()
    }

    #[inline]
    pub fn limit(&self) -> f64 {
        self.limit
    }

    #[inline]
    pub fn set_limit(&mut self, limit: f64) {
        self.limit = limit;
    }

    /// Number of trips since construction.
    #[inline]
    pub fn trips(&self) -> u32 {
        self.trips
    }

    #[inline]
    pub fn last_cause(&self) -> Option<TripCause> {
        self.last_cause
    }

    /// Non-finite samples discarded since construction.
    #[inline]
    pub fn rejected_samples(&self) -> u32 {
        self.rejected
    }

    /// Check the latest filtered pressure and motor current against the
    /// limits. Returns the trip cause when the arm must be opened now.
    pub fn check(&mut self, state: VentilatorState, motor_current: f64) -> Option<TripCause> {
        if matches!(state, VentilatorState::Expiration | VentilatorState::Idle) {
            return None;
        }

        let pressure = self.filter.output();
        let cause = if pressure >= self.limit {
            TripCause::OverPressure
        } else if motor_current.abs() > self.max_current {
            TripCause::OverCurrent
        } else {
            return None;
        };

        self.trips = self.trips.saturating_add(1);
        self.last_cause = Some(cause);
        warn!(
            ?cause,
            ?state,
            pressure,
            limit = self.limit,
            motor_current,
            "safety interlock tripped, fast-opening"
        );
        Some(cause)
    }

    /// Drop the filter history (next sample re-seeds it).
    pub fn reset_filter(&mut self) {
        self.filter.reset();
        debug!("pressure filter reset");
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
