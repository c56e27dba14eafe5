//! # BVM Control Unit Library
//!
//! Control core for a bag-valve-mask ventilator: a motor arm squeezes a
//! self-inflating bag on a timed breath cycle.
//!
//! ## Layers
//!
//! 1. **Servo** - cascaded position/velocity PID, signal filtering, fault latching
//! 2. **MotionPlanner** - trapezoidal velocity profiles for timed segments
//! 3. **Homing** - startup zeroing against the home limit switch
//! 4. **Ventilator** - breath sequencing, pressure measurement, safety interlock
//! 5. **Alarms** - prioritised alarm registry evaluated on the slow tick
//!
//! [`cycle::CycleRunner`] owns all of them and runs the three tick rates.
//! Hardware is reached only through the capability traits in
//! `bvm_common::hal`; [`sim`] provides a simulated plant behind them.
//!
//! ## Bounded-Time Ticks
//!
//! Every periodic operation runs in bounded time without heap allocation.
//! Setting tables are fixed-capacity and all state is owned by the runner.

pub mod command;
pub mod config;
pub mod control;
pub mod cycle;
pub mod safety;
pub mod sim;
pub mod state;
