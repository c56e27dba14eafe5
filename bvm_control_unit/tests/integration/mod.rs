//! Shared harness for the integration tests.

mod breath_cycle;
mod config_loading;
mod homing_startup;
mod safety_interlock;

use bvm_common::control_unit::config::BvmConfig;
use bvm_common::control_unit::telemetry::CoreTelemetry;
use bvm_control_unit::sim::{SharedPlant, SimParams, SimRunner, build_sim_runner};

pub const DT_S: f64 = 0.001;

/// Runner built from `config` and initialised (homing started).
pub fn started(config: &BvmConfig) -> (SharedPlant, SimRunner) {
    let (plant, mut runner) = build_sim_runner(config, SimParams::default());
    runner.init();
    (plant, runner)
}

/// Runner that has completed homing.
pub fn homed(config: &BvmConfig) -> (SharedPlant, SimRunner) {
    let (plant, mut runner) = started(config);
    for _ in 0..10_000 {
        if runner.homing().is_done() {
            break;
        }
        plant.borrow_mut().step(DT_S);
        runner.step();
    }
    assert!(runner.homing().is_done(), "homing did not complete in 10 s");
    (plant, runner)
}

/// Outcome of a simulated run.
#[derive(Debug, Default)]
pub struct RunTrace {
    pub snapshots: Vec<CoreTelemetry>,
    pub max_arm_deg: f64,
    pub min_arm_deg: f64,
    pub max_pressure: f64,
}

impl RunTrace {
    /// Whether any snapshot carried the given alarm bit.
    pub fn saw_alarm(&self, bit: u8) -> bool {
        self.snapshots.iter().any(|t| t.alarms & bit != 0)
    }
}

/// Advance plant and runner for `seconds` of simulated time.
pub fn run_for(plant: &SharedPlant, runner: &mut SimRunner, seconds: f64) -> RunTrace {
    let ticks = (seconds / DT_S).round() as u64;
    let mut trace = RunTrace {
        min_arm_deg: f64::INFINITY,
        max_arm_deg: f64::NEG_INFINITY,
        ..RunTrace::default()
    };
    for _ in 0..ticks {
        plant.borrow_mut().step(DT_S);
        if let Some(t) = runner.step() {
            trace.snapshots.push(t);
        }
        let p = plant.borrow();
        trace.max_arm_deg = trace.max_arm_deg.max(p.arm_deg());
        trace.min_arm_deg = trace.min_arm_deg.min(p.arm_deg());
        trace.max_pressure = trace.max_pressure.max(p.pressure());
    }
    trace
}

/// Start breathing at the given settings on a homed runner.
pub fn breathe(runner: &mut SimRunner, tv_idx: usize, rate_idx: usize) {
    let v = runner.ventilator_mut();
    v.set_tv_idx(tv_idx);
    v.set_rate_idx(rate_idx);
    runner.set_operational(true);
}
