//! Safety module root.
//!
//! Pressure/current interlock evaluated every sequencing tick, and the
//! prioritised alarm registry evaluated on the slow tick.

pub mod alarms;
pub mod interlock;
