//! State machine enums for the control core.
//!
//! All enums use `#[repr(u8)]` with explicit discriminants for compact
//! telemetry transport.

use serde::{Deserialize, Serialize};

/// Servo operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ServoMode {
    /// Output held at zero.
    #[default]
    Off = 0,
    /// Velocity loop only.
    Velocity = 1,
    /// Cascaded position → velocity loops.
    Position = 2,
}

/// Trapezoidal planner phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum PlannerPhase {
    /// No motion in progress.
    #[default]
    Idle = 0,
    Accelerating = 1,
    Constant = 2,
    Decelerating = 3,
}

/// Respiration state.
///
/// Each breathing state names the motion segment currently executing:
/// INSPIRATION closes the arm, INSPIRATORY_HOLD holds it closed,
/// EXPIRATION opens it (and dwells open for the rest of the breath).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum VentilatorState {
    /// Parked at the idle position.
    Idle = 0,
    /// Moving from idle to the open position before the first breath.
    GoToStart = 1,
    /// Closing toward the tidal-volume position.
    Inspiration = 2,
    /// Holding closed for plateau measurement.
    InspiratoryHold = 3,
    /// Opening, then dwelling open.
    Expiration = 4,
    /// Moving to the idle position.
    #[default]
    GoToIdle = 5,
}

impl VentilatorState {
    /// Returns true for the states that make up a breath.
    #[inline]
    pub const fn is_breathing(&self) -> bool {
        matches!(
            self,
            Self::Inspiration | Self::InspiratoryHold | Self::Expiration
        )
    }
}

/// Homing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum HomingState {
    #[default]
    Idle = 0,
    /// Driving toward the home switch.
    Homing = 1,
    /// Backing off until the switch releases.
    HomingBackup = 2,
    /// Position reference established.
    Done = 3,
}
