//! Control engine root.
//!
//! PID, signal filters, debounced fault predicates, the trapezoidal motion
//! planner and the servo loop that ties them to the motor.

pub mod debounce;
pub mod filters;
pub mod pid;
pub mod planner;
pub mod servo;
