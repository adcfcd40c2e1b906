//! Block level metering and a VOX gate on top of it.
//!
//! Levels are peak deviations from the block mean, which removes the
//! converter's mid-scale bias.

use crate::types::Sample;
use heapless::HistoryBuffer;

/// Blocks averaged before the gate decides
pub const METER_WINDOW: usize = 8;

/// Gate opens this far above the calibrated floor
const VOX_MARGIN: u16 = 64;

/// Gate closes below `open threshold - VOX_HYSTERESIS`
const VOX_HYSTERESIS: u16 = 16;

/// Largest distance of any sample from the block mean
pub fn block_peak(samples: impl Iterator<Item = Sample> + Clone) -> u16 {
    let (sum, count) = samples
        .clone()
        .fold((0i64, 0i64), |(sum, count), s| (sum + i64::from(s), count + 1));
    if count == 0 {
        return 0;
    }
    let mean = sum / count;

    samples
        .map(|s| (i64::from(s) - mean).unsigned_abs())
        .max()
        .map_or(0, |peak| peak.min(u64::from(u16::MAX)) as u16)
}

/// Smoothed level with an open/closed voice gate
pub struct LevelMeter {
    history: HistoryBuffer<u16, METER_WINDOW>,
    noise_floor: u16,
    open: bool,
}

impl LevelMeter {
    pub const fn new(noise_floor: u16) -> Self {
        Self {
            history: HistoryBuffer::new(),
            noise_floor,
            open: false,
        }
    }

    pub fn noise_floor(&self) -> u16 {
        self.noise_floor
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Average of the retained peaks
    pub fn level(&self) -> u16 {
        let len = self.history.len();
        if len == 0 {
            return 0;
        }
        let sum: u32 = self.history.iter().map(|&p| u32::from(p)).sum();
        (sum / len as u32) as u16
    }

    /// Feed one block peak. Returns the new gate state when it changed.
    pub fn update(&mut self, peak: u16) -> Option<bool> {
        self.history.write(peak);

        let threshold = self.noise_floor.saturating_add(VOX_MARGIN);
        let level = self.level();
        let open = if self.open {
            level >= threshold.saturating_sub(VOX_HYSTERESIS)
        } else {
            level >= threshold
        };

        if open == self.open {
            return None;
        }
        self.open = open;
        Some(open)
    }
}
