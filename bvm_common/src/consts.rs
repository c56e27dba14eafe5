//! System-wide constants for the BVM workspace.
//!
//! Single source of truth for numeric limits and default paths.

use static_assertions::const_assert;

/// Maximum number of entries in a tidal-volume or rate setting table.
pub const MAX_SETTINGS: usize = 8;

/// Default actuator control period in milliseconds (1 kHz).
pub const SERVO_PERIOD_MS: u32 = 1;

/// Default sensing + sequencing period in milliseconds.
pub const CONTROL_PERIOD_MS: u32 = 10;

/// Default UI/alarm period in milliseconds.
pub const UI_PERIOD_MS: u32 = 50;

/// Milliseconds per minute, used to convert breaths/min into a breath period.
pub const MS_PER_MINUTE: f64 = 60_000.0;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/bvm/bvm.toml";

/// Default service name reported in logs.
pub const DEFAULT_SERVICE_NAME: &str = "bvm-control-unit";

// Setting indices are carried as `u8` in telemetry.
const_assert!(MAX_SETTINGS <= u8::MAX as usize);
const_assert!(CONTROL_PERIOD_MS % SERVO_PERIOD_MS == 0);
const_assert!(UI_PERIOD_MS % SERVO_PERIOD_MS == 0);

/// Convert a breath rate in breaths/min into the breath period in ms.
///
/// Returns `0.0` for non-positive rates so callers degrade into the
/// planner's degenerate-duration path instead of dividing by zero.
#[inline]
pub fn bpm_to_period_ms(bpm: f64) -> f64 {
    if bpm <= 0.0 { 0.0 } else { MS_PER_MINUTE / bpm }
}
