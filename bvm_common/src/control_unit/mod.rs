//! Control core shared types.
//!
//! Everything the ventilator control core exchanges with its collaborators:
//! state enums, the servo fault bitset, configuration structures and
//! telemetry snapshots.

pub mod config;
pub mod error;
pub mod state;
pub mod telemetry;
