//! Integration test: pressure interlock and alarms.
//!
//! Validates: an obstructed airway or an over-deep setting trips the
//! interlock, the arm is fast-opened before reaching the closed position,
//! breathing continues, and the alarm registry reports the event.

use bvm_common::control_unit::config::BvmConfig;
use bvm_control_unit::control::servo::ServoAxis;
use bvm_control_unit::safety::alarms::{AlarmKind, AlarmSet};

use super::{breathe, homed, run_for};

#[test]
fn obstruction_trips_and_fast_opens() {
    let config = BvmConfig::default();
    let (plant, mut runner) = homed(&config);
    // 55 deg now produces 65 cmH2O; 40 cmH2O is reached near 47 deg.
    plant.borrow_mut().set_obstruction(4.0);
    breathe(&mut runner, 0, 5);
    run_for(&plant, &mut runner, 7.0);

    let trace = run_for(&plant, &mut runner, 15.0);
    let t = runner.telemetry();

    assert!(t.ventilator.interlock_trips >= 2, "trips: {}", t.ventilator.interlock_trips);
    assert!(runner.ventilator().last_trip_cause().is_some());
    assert!(trace.max_arm_deg < 53.0, "arm reached {}", trace.max_arm_deg);
    assert!(trace.min_arm_deg > 30.0);
    assert!(t.ventilator.breath_count >= 4);
    assert_eq!(t.servo.faults, 0);
    assert!(trace.saw_alarm(AlarmSet::OVER_PRESSURE.bits()));
}

#[test]
fn deep_setting_is_capped_by_limit() {
    let config = BvmConfig::default();
    let (plant, mut runner) = homed(&config);
    // 90 deg would reach 46 cmH2O.
    breathe(&mut runner, 5, 5);
    run_for(&plant, &mut runner, 7.0);

    let trace = run_for(&plant, &mut runner, 10.0);
    assert!(runner.telemetry().ventilator.interlock_trips >= 1);
    assert!(trace.max_arm_deg < 90.0, "arm reached {}", trace.max_arm_deg);
}

#[test]
fn lowered_limit_trips_normal_breath() {
    let config = BvmConfig::default();
    let (plant, mut runner) = homed(&config);
    // 40 - 13 * 2 = 14 cmH2O; a normal 55 deg breath reaches 20.
    runner.adjust_peak_pressure_limit(-13);
    assert_eq!(runner.ventilator().peak_pressure_limit(), 14.0);

    breathe(&mut runner, 0, 5);
    run_for(&plant, &mut runner, 15.0);

    let t = runner.telemetry();
    assert_eq!(t.ventilator.peak_pressure_limit, 14.0);
    assert!(t.ventilator.interlock_trips >= 1);
}

#[test]
fn limit_saturates_at_display_range() {
    let config = BvmConfig::default();
    let (_plant, mut runner) = homed(&config);
    runner.adjust_peak_pressure_limit(100);
    assert_eq!(runner.ventilator().peak_pressure_limit(), 60.0);
    runner.adjust_peak_pressure_limit(-100);
    assert_eq!(runner.ventilator().peak_pressure_limit(), 10.0);
}

#[test]
fn no_trips_while_idle() {
    let config = BvmConfig::default();
    let (plant, mut runner) = homed(&config);
    plant.borrow_mut().set_obstruction(5.0);
    run_for(&plant, &mut runner, 6.0);

    let t = runner.telemetry();
    assert_eq!(t.ventilator.interlock_trips, 0);
    assert_eq!(t.ventilator.breath_count, 0);
    assert!(!runner.alarms().is_alarmed(AlarmKind::OverPressure));
}

#[test]
fn driver_fault_latches_motion_alarm() {
    let config = BvmConfig::default();
    let (plant, mut runner) = homed(&config);
    plant.borrow_mut().set_driver_fault(true);
    let trace = run_for(&plant, &mut runner, 0.2);

    assert!(runner.servo().faults().has_motion_fault());
    assert!(trace.saw_alarm(AlarmSet::MOTION_FAULT.bits()));
    assert_eq!(runner.alarms().highest_priority(), Some(AlarmKind::MotionFault));

    plant.borrow_mut().set_driver_fault(false);
    runner.clear_faults();
    run_for(&plant, &mut runner, 0.1);
    assert!(!runner.servo().faults().is_faulted());
    assert!(!runner.alarms().is_any_alarmed());
}
