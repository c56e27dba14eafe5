//! Integration test: startup sequence.
//!
//! Validates: init → HOMING in velocity mode → switch found → backoff →
//! position zeroed → ventilator reset and started → parked at idle.

use bvm_common::control_unit::config::BvmConfig;
use bvm_common::control_unit::state::{HomingState, ServoMode, VentilatorState};
use bvm_control_unit::control::servo::ServoAxis;

use super::{homed, run_for, started};

#[test]
fn ventilator_waits_for_homing() {
    let config = BvmConfig::default();
    let (plant, mut runner) = started(&config);
    run_for(&plant, &mut runner, 0.1);

    assert_eq!(runner.homing().state(), HomingState::Homing);
    assert_eq!(runner.servo().mode(), ServoMode::Velocity);
    assert_eq!(runner.ventilator().state(), VentilatorState::GoToIdle);
    assert_eq!(runner.ventilator().breath_count(), 0);
    assert!(runner.stats().homed_at_ms.is_none());
    // Moving toward the switch.
    assert!(runner.servo().velocity() < 0.0);
}

#[test]
fn homing_zeroes_at_switch_and_parks() {
    let config = BvmConfig::default();
    let (plant, mut runner) = homed(&config);

    assert_eq!(runner.servo().mode(), ServoMode::Position);
    assert!(runner.servo().position().abs() < 0.01);
    let arm = plant.borrow().arm_deg();
    assert!(arm > -0.5 && arm < 2.0, "arm at {arm}");
    assert!(runner.stats().homed_at_ms.is_some());

    run_for(&plant, &mut runner, 5.0);
    assert_eq!(runner.ventilator().state(), VentilatorState::Idle);
    let idle = runner.servo().position_deg();
    assert!((idle - config.motion.idle_pos_deg).abs() < 0.5, "idle at {idle}");
    assert_eq!(runner.servo().faults().bits(), 0);
}

#[test]
fn inverted_motor_homes() {
    let mut config = BvmConfig::default();
    config.motor.inverted = true;
    let (plant, mut runner) = homed(&config);
    run_for(&plant, &mut runner, 5.0);

    assert_eq!(runner.ventilator().state(), VentilatorState::Idle);
    assert!(!runner.servo().faults().is_faulted());
}

#[test]
fn operational_before_homing_is_discarded() {
    let config = BvmConfig::default();
    let (plant, mut runner) = started(&config);
    runner.set_operational(true);
    run_for(&plant, &mut runner, 12.0);

    assert!(runner.homing().is_done());
    assert!(!runner.ventilator().is_operational());
    assert_eq!(runner.ventilator().breath_count(), 0);
}

#[test]
fn telemetry_is_json_serialisable() {
    let config = BvmConfig::default();
    let (plant, mut runner) = homed(&config);
    let trace = run_for(&plant, &mut runner, 0.2);
    assert_eq!(trace.snapshots.len(), 4);

    let last = trace.snapshots[3];
    assert_eq!(last.homing, HomingState::Done);
    let json = serde_json::to_string(&last).unwrap();
    assert!(json.contains("\"breath_count\":0"));
    assert!(json.contains("\"peak_pressure_limit\":40.0"));
}
