//! Sample-rate timebase derived from the engine's reference clock.
//!
//! The converter is triggered every `reference_hz / sample_rate` ticks,
//! rounded down. The realized rate is therefore `F / floor(F / R)`, never
//! lower than requested and off by less than one tick period per sample.

use crate::error::CaptureError;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timebase {
    reference_hz: u32,
    ticks: u32,
}

impl Timebase {
    /// Compute the timebase for `sample_rate` against a `reference_hz` tick.
    ///
    /// Fails for a zero rate or a rate faster than the tick itself.
    pub fn for_rate(reference_hz: u32, sample_rate: u32) -> Result<Self, CaptureError> {
        if sample_rate == 0 || sample_rate > reference_hz {
            return Err(CaptureError::UnsupportedConfiguration);
        }

        Ok(Self {
            reference_hz,
            ticks: reference_hz / sample_rate,
        })
    }

    pub const fn reference_hz(&self) -> u32 {
        self.reference_hz
    }

    /// Reference ticks between two conversions
    pub const fn ticks_per_sample(&self) -> u32 {
        self.ticks
    }

    /// Auto-reload value for an up-counting timer (period is `reload + 1`)
    pub const fn reload(&self) -> u32 {
        self.ticks - 1
    }

    /// Realized sample rate in mHz
    pub const fn realized_rate_millihertz(&self) -> u64 {
        self.reference_hz as u64 * 1000 / self.ticks as u64
    }

    /// Realized sample rate in Hz, truncated
    pub const fn realized_rate_hz(&self) -> u32 {
        self.reference_hz / self.ticks
    }

    /// How far the realized rate lies above `requested_hz`, in mHz
    pub const fn rate_error_millihertz(&self, requested_hz: u32) -> u64 {
        self.realized_rate_millihertz()
            .saturating_sub(requested_hz as u64 * 1000)
    }
}
