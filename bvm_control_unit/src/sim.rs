//! Simulated plant: gearmotor, encoder, home switch and bag/lung pressure.
//!
//! One [`SimPlant`] is shared (single-threaded) between handle types that
//! implement the hardware capability traits, so the control core runs
//! unmodified against it. The harness calls [`SimPlant::step`] once per
//! servo tick before stepping the scheduler.

pub mod lung;
pub mod motor;

use std::cell::RefCell;
use std::rc::Rc;

use bvm_common::control_unit::config::BvmConfig;
use bvm_common::hal::{Encoder, LimitSwitch, MotorDriver, PressureSensor};

use crate::cycle::CycleRunner;

use self::lung::{LungModel, LungParams};
use self::motor::{MotorModel, MotorParams};

/// Plant parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimParams {
    pub motor: MotorParams,
    pub lung: LungParams,
    /// Negate the duty seen by the plant and the counts it reports,
    /// modelling a motor wired backwards.
    pub inverted: bool,
}

/// Motor and lung models advanced together.
#[derive(Debug, Clone)]
pub struct SimPlant {
    motor: MotorModel,
    lung: LungModel,
    inverted: bool,
    driver_fault: bool,
    time_s: f64,
}

/// Shared handle to the plant.
pub type SharedPlant = Rc<RefCell<SimPlant>>;

impl SimPlant {
    pub fn new(params: SimParams) -> Self {
        Self {
            motor: MotorModel::new(params.motor),
            lung: LungModel::new(params.lung),
            inverted: params.inverted,
            driver_fault: false,
            time_s: 0.0,
        }
    }

    /// Build a shared plant and one handle per capability.
    pub fn shared(
        params: SimParams,
    ) -> (SharedPlant, SimDriver, SimEncoder, SimLimitSwitch, SimPressureSensor) {
        let plant = Rc::new(RefCell::new(Self::new(params)));
        (
            Rc::clone(&plant),
            SimDriver(Rc::clone(&plant)),
            SimEncoder(Rc::clone(&plant)),
            SimLimitSwitch(Rc::clone(&plant)),
            SimPressureSensor(plant),
        )
    }

    /// Advance by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        self.motor.step(dt, self.lung.load());
        self.lung.step(dt, self.motor.angle().to_degrees());
        self.time_s += dt;
    }

    /// Arm angle [deg].
    #[inline]
    pub fn arm_deg(&self) -> f64 {
        self.motor.angle().to_degrees()
    }

    #[inline]
    pub fn pressure(&self) -> f64 {
        self.lung.pressure()
    }

    #[inline]
    pub fn time_s(&self) -> f64 {
        self.time_s
    }

    #[inline]
    pub fn motor(&self) -> &MotorModel {
        &self.motor
    }

    pub fn set_obstruction(&mut self, obstruction: f64) {
        self.lung.set_obstruction(obstruction);
    }

    pub fn set_driver_fault(&mut self, fault: bool) {
        self.driver_fault = fault;
    }
}

// ─── Capability Handles ─────────────────────────────────────────────

/// Motor driver view of the plant.
#[derive(Debug, Clone)]
pub struct SimDriver(SharedPlant);

impl MotorDriver for SimDriver {
    fn set_output(&mut self, duty: f64) {
        let mut plant = self.0.borrow_mut();
        let duty = if plant.inverted { -duty } else { duty };
        plant.motor.set_duty(duty);
    }

    fn measured_current(&self) -> f64 {
        let plant = self.0.borrow();
        if plant.inverted {
            -plant.motor.current()
        } else {
            plant.motor.current()
        }
    }

    fn fault(&self) -> bool {
        self.0.borrow().driver_fault
    }
}

/// Encoder view of the plant.
#[derive(Debug, Clone)]
pub struct SimEncoder(SharedPlant);

impl Encoder for SimEncoder {
    fn delta_since_last_read(&mut self) -> i32 {
        let mut plant = self.0.borrow_mut();
        let delta = plant.motor.read_delta();
        if plant.inverted { -delta } else { delta }
    }

    fn reset_reference(&mut self) {
        self.0.borrow_mut().motor.reset_reference();
    }
}

/// Home switch view of the plant.
#[derive(Debug, Clone)]
pub struct SimLimitSwitch(SharedPlant);

impl LimitSwitch for SimLimitSwitch {
    fn is_asserted(&self) -> bool {
        self.0.borrow().motor.at_home()
    }
}

/// Pressure transducer view of the plant [cmH2O].
#[derive(Debug, Clone)]
pub struct SimPressureSensor(SharedPlant);

impl PressureSensor for SimPressureSensor {
    fn read(&mut self) -> f64 {
        self.0.borrow().lung.pressure()
    }
}

// ─── Harness ────────────────────────────────────────────────────────

/// Scheduler wired to the simulated plant.
pub type SimRunner = CycleRunner<SimDriver, SimEncoder, SimLimitSwitch, SimPressureSensor>;

/// Build a plant and a scheduler driving it. The motor inversion flag is
/// taken from `config` so plant and servo agree on wiring.
pub fn build_sim_runner(config: &BvmConfig, params: SimParams) -> (SharedPlant, SimRunner) {
    let params = SimParams {
        inverted: config.motor.inverted,
        ..params
    };
    let (plant, driver, encoder, switch, sensor) = SimPlant::shared(params);
    let runner = CycleRunner::new(config, driver, encoder, switch, sensor);
    (plant, runner)
}

/// Advance plant and scheduler together for `ticks` base ticks.
pub fn run_ticks(plant: &SharedPlant, runner: &mut SimRunner, ticks: u64, dt_s: f64) {
    for _ in 0..ticks {
        plant.borrow_mut().step(dt_s);
        runner.step();
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
