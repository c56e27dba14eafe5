//! Prelude module for common re-exports.
//!
//! ```rust
//! use bvm_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::control_unit::config::{BvmConfig, PidParams, Range};

// ─── State & Faults ─────────────────────────────────────────────────
pub use crate::control_unit::error::ServoFaults;
pub use crate::control_unit::state::{HomingState, PlannerPhase, ServoMode, VentilatorState};

// ─── Hardware Interfaces ────────────────────────────────────────────
pub use crate::hal::{Encoder, LimitSwitch, MotorDriver, PressureSensor};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{CONTROL_PERIOD_MS, MAX_SETTINGS, SERVO_PERIOD_MS, UI_PERIOD_MS};
