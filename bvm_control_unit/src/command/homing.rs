//! Startup homing sequence.
//!
//! Establishes the arm's zero position against the home limit switch.
//!
//! ## Lifecycle
//!
//! 1. `start()` → HOMING, servo in VELOCITY mode
//! 2. HOMING: drive at the (negative) homing velocity until the switch asserts
//! 3. HOMING_BACKUP: drive at the (positive) backoff velocity until it releases
//! 4. DONE: reset the servo loops, command zero velocity, zero the position
//!
//! DONE is terminal until `start()` is called again.

use bvm_common::control_unit::config::HomingConfig;
use bvm_common::control_unit::state::{HomingState, ServoMode};
use tracing::debug;

use crate::control::servo::ServoAxis;

/// Homing sequencer for a single servo axis.
#[derive(Debug, Clone)]
pub struct HomingController {
    state: HomingState,
    /// Approach velocity [rad/s], negative.
    homing_velocity: f64,
    /// Backoff velocity [rad/s], positive.
    backoff_velocity: f64,
}

impl HomingController {
    pub fn new(config: &HomingConfig) -> Self {
        Self {
            state: HomingState::Idle,
            homing_velocity: config.homing_velocity,
            backoff_velocity: config.backoff_velocity,
        }
    }

    #[inline]
    pub fn state(&self) -> HomingState {
        self.state
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.state == HomingState::Done
    }

    /// Begin homing. Restarts the sequence if it already completed.
    pub fn start(&mut self, servo: &mut impl ServoAxis) {
        self.state = HomingState::Homing;
        servo.set_mode(ServoMode::Velocity);
        debug!("homing started");
    }

    /// One sequencing tick. Returns the state after the tick.
    pub fn update(&mut self, servo: &mut impl ServoAxis) -> HomingState {
        match self.state {
            HomingState::Homing => {
                if servo.limit_switch_asserted() {
                    self.state = HomingState::HomingBackup;
                    servo.set_velocity(self.backoff_velocity);
                    debug!("home switch reached, backing off");
                } else {
                    servo.set_velocity(self.homing_velocity);
                }
            }
            HomingState::HomingBackup => {
                if servo.limit_switch_asserted() {
                    servo.set_velocity(self.backoff_velocity);
                } else {
                    self.state = HomingState::Done;
                    servo.reset();
                    servo.set_velocity(0.0);
                    servo.zero();
                    debug!("homing complete, position zeroed");
                }
            }
            HomingState::Idle | HomingState::Done => {}
        }
        self.state
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use bvm_common::control_unit::error::ServoFaults;

    #[derive(Debug, Default)]
    struct MockAxis {
        mode: ServoMode,
        velocity: f64,
        switch: bool,
        resets: u32,
        zeros: u32,
    }

    impl ServoAxis for MockAxis {
        fn set_mode(&mut self, mode: ServoMode) {
            self.mode = mode;
        }
        fn mode(&self) -> ServoMode {
            self.mode
        }
        fn set_pos(&mut self, _rad: f64) {}
        fn set_velocity(&mut self, rad_per_s: f64) {
            self.velocity = rad_per_s;
        }
        fn position(&self) -> f64 {
            0.0
        }
        fn velocity(&self) -> f64 {
            self.velocity
        }
        fn current(&self) -> f64 {
            0.0
        }
        fn faults(&self) -> ServoFaults {
            ServoFaults::empty()
        }
        fn limit_switch_asserted(&self) -> bool {
            self.switch
        }
        fn zero(&mut self) {
            self.zeros += 1;
        }
        fn reset(&mut self) {
            self.resets += 1;
        }
    }

    fn controller() -> HomingController {
        HomingController::new(&HomingConfig::default())
    }

    #[test]
    fn idle_until_started() {
        let mut h = controller();
        let mut axis = MockAxis::default();
        assert_eq!(h.update(&mut axis), HomingState::Idle);
        assert_eq!(axis.velocity, 0.0);
        assert!(!h.is_done());
    }

    #[test]
    fn start_selects_velocity_mode() {
        let mut h = controller();
        let mut axis = MockAxis::default();
        h.start(&mut axis);
        assert_eq!(axis.mode, ServoMode::Velocity);
        assert_eq!(h.state(), HomingState::Homing);
    }

    #[test]
    fn full_sequence() {
        let mut h = controller();
        let mut axis = MockAxis::default();
        h.start(&mut axis);

        for _ in 0..5 {
            assert_eq!(h.update(&mut axis), HomingState::Homing);
            assert_eq!(axis.velocity, -0.6);
        }

        axis.switch = true;
        assert_eq!(h.update(&mut axis), HomingState::HomingBackup);
        assert_eq!(axis.velocity, 0.2);
        assert_eq!(h.update(&mut axis), HomingState::HomingBackup);

        axis.switch = false;
        assert_eq!(h.update(&mut axis), HomingState::Done);
        assert_eq!(axis.velocity, 0.0);
        assert_eq!(axis.resets, 1);
        assert_eq!(axis.zeros, 1);
        assert!(h.is_done());
    }

    #[test]
    fn done_is_terminal_until_restarted() {
        let mut h = controller();
        let mut axis = MockAxis {
            switch: true,
            ..MockAxis::default()
        };
        h.start(&mut axis);
        h.update(&mut axis);
        axis.switch = false;
        h.update(&mut axis);
        assert!(h.is_done());

        axis.switch = true;
        assert_eq!(h.update(&mut axis), HomingState::Done);
        assert_eq!(axis.zeros, 1);

        h.start(&mut axis);
        assert_eq!(h.update(&mut axis), HomingState::HomingBackup);
    }
}
