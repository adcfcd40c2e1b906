//! Buffer mode policy: which transfer flags a mode needs and what a
//! completion event means for it. Pure functions, no hardware access.

use crate::types::{BufferMode, ReadyRegion};

/// Transfer options programmed into the engine for a session
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransferFlags {
    /// Restart at the buffer start after the last sample
    pub circular: bool,
    /// Raise an event when half of the buffer is filled
    pub half_complete_irq: bool,
    /// Raise an event when the whole buffer is filled
    pub complete_irq: bool,
}

/// Completion event raised by the engine
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CompletionEvent {
    HalfComplete,
    Complete,
}

/// Pending status bits reported by the engine
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventFlags(u8);

impl EventFlags {
    pub const NONE: Self = Self(0);
    pub const HALF_COMPLETE: Self = Self(1 << 0);
    pub const COMPLETE: Self = Self(1 << 1);
    pub const TRANSFER_ERROR: Self = Self(1 << 2);

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// True if a half or full transfer event is pending
    pub const fn has_completion(&self) -> bool {
        self.0 & (Self::HALF_COMPLETE.0 | Self::COMPLETE.0) != 0
    }

    /// Pending completion events in the order the engine raised them
    pub fn completions(&self) -> impl Iterator<Item = CompletionEvent> {
        let half = self.contains(Self::HALF_COMPLETE).then_some(CompletionEvent::HalfComplete);
        let full = self.contains(Self::COMPLETE).then_some(CompletionEvent::Complete);
        half.into_iter().chain(full)
    }
}

impl core::ops::BitOr for EventFlags {
    type Output = EventFlags;

    fn bitor(self, rhs: EventFlags) -> EventFlags {
        self.union(rhs)
    }
}

impl From<CompletionEvent> for EventFlags {
    fn from(event: CompletionEvent) -> Self {
        match event {
            CompletionEvent::HalfComplete => EventFlags::HALF_COMPLETE,
            CompletionEvent::Complete => EventFlags::COMPLETE,
        }
    }
}

/// Outcome of a completion event for the current mode
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Decision {
    /// Region the consumer may read now
    pub ready: ReadyRegion,
    /// Engine must be halted by the interrupt handler
    pub stop_engine: bool,
}

impl BufferMode {
    /// Transfer flags to program for this mode
    pub const fn transfer_flags(&self) -> TransferFlags {
        match self {
            BufferMode::OneShot => TransferFlags {
                circular: false,
                half_complete_irq: false,
                complete_irq: true,
            },
            BufferMode::Continuous => TransferFlags {
                circular: true,
                half_complete_irq: false,
                complete_irq: true,
            },
            BufferMode::ContinuousSplit => TransferFlags {
                circular: true,
                half_complete_irq: true,
                complete_irq: true,
            },
        }
    }

    /// Returns true if the engine keeps running after a full transfer
    pub const fn restarts_itself(&self) -> bool {
        match self {
            BufferMode::OneShot => false,
            BufferMode::Continuous | BufferMode::ContinuousSplit => true,
        }
    }

    /// Returns true if capture starts as soon as the session is opened
    pub const fn arms_on_open(&self) -> bool {
        self.restarts_itself()
    }

    /// Samples handed out per read for a buffer of `len` samples
    pub const fn block_len(&self, len: usize) -> usize {
        match self {
            BufferMode::OneShot | BufferMode::Continuous => len,
            BufferMode::ContinuousSplit => len / 2,
        }
    }

    /// Ready region before the first event arrives
    pub const fn initial_region(&self, len: usize) -> ReadyRegion {
        ReadyRegion::new(0, self.block_len(len))
    }

    /// Interpret `event` for a buffer of `len` samples.
    ///
    /// Returns `None` for events the mode never enables; the caller treats
    /// those as spurious.
    pub const fn on_event(&self, event: CompletionEvent, len: usize) -> Option<Decision> {
        match (self, event) {
            (BufferMode::OneShot, CompletionEvent::Complete) => Some(Decision {
                ready: ReadyRegion::new(0, len),
                stop_engine: true,
            }),
            (BufferMode::Continuous, CompletionEvent::Complete) => Some(Decision {
                ready: ReadyRegion::new(0, len),
                stop_engine: false,
            }),
            (BufferMode::ContinuousSplit, CompletionEvent::HalfComplete) => Some(Decision {
                ready: ReadyRegion::new(0, len / 2),
                stop_engine: false,
            }),
            (BufferMode::ContinuousSplit, CompletionEvent::Complete) => Some(Decision {
                ready: ReadyRegion::new(len / 2, len / 2),
                stop_engine: false,
            }),
            (BufferMode::OneShot | BufferMode::Continuous, CompletionEvent::HalfComplete) => None,
        }
    }
}
