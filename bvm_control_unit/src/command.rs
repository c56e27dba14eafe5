//! Command processing root.
//!
//! Startup homing of the arm against its home switch.

pub mod homing;
