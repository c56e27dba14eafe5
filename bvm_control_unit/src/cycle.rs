//! Three-rate cooperative scheduler.
//!
//! Owns every control-core component and drives them from a single base
//! tick equal to the servo period:
//!
//! | Rate   | Period              | Work                                          |
//! |--------|---------------------|-----------------------------------------------|
//! | fast   | `servo_period_ms`   | `Servo::update`                               |
//! | medium | `control_period_ms` | pressure sample, homing or respiration update |
//! | slow   | `ui_period_ms`      | alarm evaluation, telemetry snapshot          |
//!
//! Every `step()` is bounded: no allocation, no blocking, no I/O beyond the
//! hardware capability calls. Time is derived from the tick count.

use bvm_common::control_unit::config::BvmConfig;
use bvm_common::control_unit::state::HomingState;
use bvm_common::control_unit::telemetry::CoreTelemetry;
use bvm_common::hal::{Encoder, LimitSwitch, MotorDriver, PressureSensor};
use tracing::info;

use crate::command::homing::HomingController;
use crate::control::servo::{Servo, ServoAxis};
use crate::safety::alarms::{AlarmEvaluator, AlarmInputs, AlarmKind, Alarms};
use crate::state::ventilator::VentilatorController;

// ─── Cycle Statistics ───────────────────────────────────────────────

/// Tick counters per rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Fast (servo) ticks executed.
    pub servo_ticks: u64,
    /// Medium (sequencing) ticks executed.
    pub control_ticks: u64,
    /// Slow (alarm/telemetry) ticks executed.
    pub ui_ticks: u64,
    /// Tick-time at which homing completed [ms].
    pub homed_at_ms: Option<u64>,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            servo_ticks: 0,
            control_ticks: 0,
            ui_ticks: 0,
            homed_at_ms: None,
        }
    }
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// Scheduler owning the servo, sequencers, pressure sensor and alarms.
#[derive(Debug)]
pub struct CycleRunner<D, E, L, S> {
    servo: Servo<D, E, L>,
    homing: HomingController,
    ventilator: VentilatorController,
    sensor: S,
    alarms: Alarms,
    evaluator: AlarmEvaluator,

    servo_period_ms: u64,
    control_divider: u64,
    ui_divider: u64,

    tick: u64,
    stats: CycleStats,
    telemetry: CoreTelemetry,
}

impl<D, E, L, S> CycleRunner<D, E, L, S>
where
    D: MotorDriver,
    E: Encoder,
    L: LimitSwitch,
    S: PressureSensor,
{
    /// Build every component from `config` around the given hardware.
    pub fn new(config: &BvmConfig, driver: D, encoder: E, limit_switch: L, sensor: S) -> Self {
        let timing = &config.timing;
        let servo_period_s = f64::from(timing.servo_period_ms) / 1000.0;
        Self {
            servo: Servo::new(
                &config.servo,
                &config.motor,
                servo_period_s,
                driver,
                encoder,
                limit_switch,
            ),
            homing: HomingController::new(&config.homing),
            ventilator: VentilatorController::with_trapezoidal(
                &config.motion,
                &config.respiration,
                &config.planner,
                f64::from(timing.control_period_ms),
            ),
            sensor,
            alarms: Alarms::new(),
            evaluator: AlarmEvaluator::new(&config.alarms),
            servo_period_ms: u64::from(timing.servo_period_ms),
            control_divider: timing.control_divider(),
            ui_divider: timing.ui_divider(),
            tick: 0,
            stats: CycleStats::new(),
            telemetry: CoreTelemetry::default(),
        }
    }

    /// Initialise the servo and begin homing.
    pub fn init(&mut self) {
        self.servo.init();
        self.homing.start(&mut self.servo);
        info!(
            control_divider = self.control_divider,
            ui_divider = self.ui_divider,
            "control core initialised, homing"
        );
    }

    /// Run one base tick. Returns the telemetry snapshot on slow ticks.
    pub fn step(&mut self) -> Option<CoreTelemetry> {
        self.servo.update();
        self.stats.servo_ticks += 1;

        if self.tick % self.control_divider == 0 {
            self.control_tick();
        }

        let snapshot = if self.tick % self.ui_divider == 0 {
            Some(self.ui_tick())
        } else {
            None
        };

        self.tick += 1;
        snapshot
    }

    fn control_tick(&mut self) {
        self.stats.control_ticks += 1;
        let pressure = self.sensor.read();

        if self.homing.is_done() {
            self.ventilator.update(pressure, &mut self.servo);
            return;
        }

        if self.homing.update(&mut self.servo) == HomingState::Done {
            let now_ms = self.now_ms();
            self.stats.homed_at_ms = Some(now_ms);
            self.ventilator.reset();
            self.ventilator.start(&mut self.servo);
            info!(now_ms, "homing complete, ventilator started");
        }
    }

    fn ui_tick(&mut self) -> CoreTelemetry {
        self.stats.ui_ticks += 1;
        let now_ms = self.now_ms();

        let servo_faults = self.servo.faults();
        let inputs = AlarmInputs {
            ventilator: self.ventilator.telemetry(),
            last_trip_cause: self.ventilator.last_trip_cause(),
            servo_faults,
        };
        self.evaluator.evaluate(&mut self.alarms, &inputs, now_ms);

        self.telemetry = CoreTelemetry {
            time_ms: now_ms,
            homing: self.homing.state(),
            servo: self.servo.telemetry(),
            ventilator: inputs.ventilator,
            alarms: self.alarms.active().bits(),
        };
        self.telemetry
    }

    // ─── Operator Inputs ────────────────────────────────────────────

    pub fn set_operational(&mut self, operational: bool) {
        self.ventilator.set_operational(operational);
    }

    /// Abandon the breath in progress and park the arm.
    pub fn stop(&mut self) {
        self.ventilator.stop();
    }

    pub fn bump_tv(&mut self, delta: i32) {
        self.ventilator.bump_tv(delta);
    }

    pub fn bump_rate(&mut self, delta: i32) {
        self.ventilator.bump_rate(delta);
    }

    pub fn adjust_peak_pressure_limit(&mut self, steps: i32) {
        self.ventilator.adjust_peak_pressure_limit(steps);
    }

    /// Power supervision is external; it reports loss of mains here.
    pub fn set_loss_of_power(&mut self, lost: bool) {
        let now_ms = self.now_ms();
        self.alarms.set(AlarmKind::LossOfPower, lost, now_ms);
    }

    /// Clear all alarms, alarm latches and servo faults.
    pub fn clear_faults(&mut self) {
        self.alarms.clear_all();
        self.evaluator.clear_latches();
        self.servo.reset();
        info!("alarms and servo faults cleared");
    }

    // ─── Accessors ──────────────────────────────────────────────────

    /// Tick-derived time [ms].
    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.tick * self.servo_period_ms
    }

    #[inline]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    #[inline]
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Most recent slow-tick snapshot.
    #[inline]
    pub fn telemetry(&self) -> &CoreTelemetry {
        &self.telemetry
    }

    #[inline]
    pub fn servo(&self) -> &Servo<D, E, L> {
        &self.servo
    }

    #[inline]
    pub fn servo_mut(&mut self) -> &mut Servo<D, E, L> {
        &mut self.servo
    }

    #[inline]
    pub fn homing(&self) -> &HomingController {
        &self.homing
    }

    #[inline]
    pub fn ventilator(&self) -> &VentilatorController {
        &self.ventilator
    }

    #[inline]
    pub fn ventilator_mut(&mut self) -> &mut VentilatorController {
        &mut self.ventilator
    }

    #[inline]
    pub fn alarms(&self) -> &Alarms {
        &self.alarms
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
