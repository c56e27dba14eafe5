//! Servo fault bitflags.
//!
//! Faults are latched by the servo loop and stay set until an explicit
//! reset. Any set bit forces the actuator output to zero.

use bitflags::bitflags;

bitflags! {
    /// Latched actuator faults.
    ///
    /// Bit positions are part of the telemetry contract.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ServoFaults: u8 {
        /// Zero encoder motion while the output is driven hard.
        const NO_ENCODER               = 0x01;
        /// Measured velocity opposes the target velocity.
        const WRONG_DIRECTION          = 0x02;
        /// Filtered motor current above threshold.
        const OVERCURRENT              = 0x04;
        /// Position error above threshold in POSITION mode.
        const EXCESSIVE_POSITION_ERROR = 0x08;
        /// Driver fault line asserted.
        const DRIVER_FAULT             = 0x10;
    }
}

impl ServoFaults {
    /// Faults that indicate a motion problem rather than an electrical one.
    pub const MOTION_MASK: Self = Self::from_bits_truncate(
        Self::NO_ENCODER.bits()
            | Self::WRONG_DIRECTION.bits()
            | Self::EXCESSIVE_POSITION_ERROR.bits()
            | Self::DRIVER_FAULT.bits(),
    );

    /// Returns true if any fault is latched.
    #[inline]
    pub const fn is_faulted(&self) -> bool {
        !self.is_empty()
    }

    /// Returns true if any motion-class fault is latched.
    #[inline]
    pub const fn has_motion_fault(&self) -> bool {
        self.intersects(Self::MOTION_MASK)
    }
}

impl Default for ServoFaults {
    fn default() -> Self {
        Self::empty()
    }
}
