//! BVM Common Library
//!
//! Shared constants, configuration and plain-old-data types for the
//! bag-valve-mask ventilator control core and the collaborators that
//! configure it or read its telemetry.
//!
//! # Module Structure
//!
//! - [`config`] - TOML loading trait and shared config fields
//! - [`consts`] - Workspace-wide limits and defaults
//! - [`control_unit`] - Config structures, state enums, fault bits, telemetry
//! - [`hal`] - Hardware capability traits consumed by the core
//! - [`prelude`] - Common re-exports for convenience

pub mod config;
pub mod consts;
pub mod control_unit;
pub mod hal;
pub mod prelude;
