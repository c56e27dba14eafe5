//! Integration test: breath sequencing on the simulated plant.
//!
//! Validates: homing → idle → go-to-start → repeating inspiration /
//! expiration at the selected rate and tidal volume, peak and plateau
//! measurement, and stop or reset back to idle.

use bvm_common::control_unit::config::BvmConfig;
use bvm_common::control_unit::state::VentilatorState;

use super::{DT_S, breathe, homed, run_for};

#[test]
fn breathes_at_selected_settings() {
    let config = BvmConfig::default();
    let (plant, mut runner) = homed(&config);
    breathe(&mut runner, 0, 5);

    run_for(&plant, &mut runner, 8.0);
    assert!(runner.ventilator().state().is_breathing());

    let trace = run_for(&plant, &mut runner, 20.0);
    let t = runner.telemetry();

    // 18 bpm for 20 s.
    assert!(t.ventilator.breath_count >= 6, "breaths: {}", t.ventilator.breath_count);
    assert_eq!(t.ventilator.interlock_trips, 0);
    assert_eq!(t.servo.faults, 0);

    // Closed position 55 deg, open 35 deg.
    assert!(trace.max_arm_deg > 48.0 && trace.max_arm_deg < 60.0, "max arm {}", trace.max_arm_deg);
    assert!(trace.min_arm_deg > 30.0 && trace.min_arm_deg < 40.0, "min arm {}", trace.min_arm_deg);

    // Static bag pressure at 55 deg is 20 cmH2O.
    let peak = t.ventilator.peak_pressure;
    assert!(peak > 12.0 && peak < 28.0, "peak {peak}");
    assert_eq!(t.alarms, 0);
}

#[test]
fn higher_rate_gives_more_breaths() {
    let config = BvmConfig::default();

    let count = |rate_idx: usize| {
        let (plant, mut runner) = homed(&config);
        breathe(&mut runner, 0, rate_idx);
        run_for(&plant, &mut runner, 36.0);
        runner.ventilator().breath_count()
    };

    let slow = count(0); // 8 bpm
    let fast = count(5); // 18 bpm
    assert!(slow >= 2, "slow: {slow}");
    assert!(fast > slow + 2, "slow {slow}, fast {fast}");
}

#[test]
fn deeper_setting_squeezes_further() {
    let config = BvmConfig::default();
    let (plant, mut runner) = homed(&config);
    breathe(&mut runner, 2, 5);
    run_for(&plant, &mut runner, 8.0);

    let trace = run_for(&plant, &mut runner, 10.0);
    assert_eq!(runner.ventilator().current_tv_idx(), 2);
    // 69 deg closed position.
    assert!(trace.max_arm_deg > 62.0 && trace.max_arm_deg < 74.0, "max arm {}", trace.max_arm_deg);
    assert_eq!(runner.telemetry().ventilator.interlock_trips, 0);
}

#[test]
fn plateau_measured_on_hold_cycles() {
    let mut config = BvmConfig::default();
    config.respiration.plateau_measurement_interval = 2;
    let (plant, mut runner) = homed(&config);
    breathe(&mut runner, 0, 5);

    run_for(&plant, &mut runner, 25.0);
    let plateau = runner.telemetry().ventilator.plateau_pressure;
    assert!(plateau > 12.0 && plateau < 28.0, "plateau {plateau}");
    assert!(runner.ventilator().breath_count() >= 4);
}

#[test]
fn stop_returns_to_idle() {
    let config = BvmConfig::default();
    let (plant, mut runner) = homed(&config);
    breathe(&mut runner, 0, 5);
    run_for(&plant, &mut runner, 9.0);
    assert!(runner.ventilator().state().is_breathing());

    runner.stop();
    run_for(&plant, &mut runner, 5.0);

    assert_eq!(runner.ventilator().state(), VentilatorState::Idle);
    assert!(!runner.ventilator().is_operational());
    let arm = plant.borrow().arm_deg();
    assert!(arm < 5.0, "arm parked at {arm}");
}

#[test]
fn reset_mid_inspiration_parks_the_arm() {
    let config = BvmConfig::default();
    let (plant, mut runner) = homed(&config);
    breathe(&mut runner, 0, 5);
    run_for(&plant, &mut runner, 8.0);

    // Catch the arm squeezing the bag.
    for _ in 0..10_000 {
        if runner.ventilator().state() == VentilatorState::Inspiration
            && plant.borrow().arm_deg() > 45.0
        {
            break;
        }
        plant.borrow_mut().step(DT_S);
        runner.step();
    }
    assert_eq!(runner.ventilator().state(), VentilatorState::Inspiration);
    assert!(plant.borrow().arm_deg() > 45.0);

    runner.ventilator_mut().reset();
    run_for(&plant, &mut runner, 5.0);

    assert_eq!(runner.ventilator().state(), VentilatorState::Idle);
    let arm = plant.borrow().arm_deg();
    assert!(arm < 5.0, "arm parked at {arm}");
}

#[test]
fn setting_changes_wait_for_next_breath() {
    let config = BvmConfig::default();
    let (plant, mut runner) = homed(&config);
    breathe(&mut runner, 0, 5);
    run_for(&plant, &mut runner, 8.0);

    runner.bump_tv(1);
    assert_eq!(runner.ventilator().tv_idx(), 1);
    assert_eq!(runner.ventilator().current_tv_idx(), 0);

    run_for(&plant, &mut runner, 4.0);
    assert_eq!(runner.ventilator().current_tv_idx(), 1);
}
