//! State machine module root.
//!
//! The respiration sequencer driving the arm through breaths.

pub mod ventilator;
