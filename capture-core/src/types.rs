//! Core data types for the capture stream

use core::ptr::NonNull;

use crate::error::CaptureError;

/// One converted audio sample as stored by the transfer engine
pub type Sample = i16;

/// Analog signal feeding the converter
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AudioSource {
    /// Microphone input
    Mic,
    /// Demodulated audio coming back from the RTX stage
    ExternalRx,
}

impl AudioSource {
    pub const fn name(&self) -> &'static str {
        match self {
            AudioSource::Mic => "mic",
            AudioSource::ExternalRx => "rtx",
        }
    }
}

impl TryFrom<u8> for AudioSource {
    type Error = CaptureError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(AudioSource::Mic),
            1 => Ok(AudioSource::ExternalRx),
            _ => Err(CaptureError::UnsupportedConfiguration),
        }
    }
}

/// Stream priority hint.
///
/// Accepted by [`crate::InputStream::open`] and otherwise ignored: input
/// streams do not arbitrate on priority yet.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AudioPriority {
    Beep,
    Prompt,
    Rx,
    Tx,
}

/// Buffer management policy of a capture session
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferMode {
    /// Engine fills the buffer once and stops; every read captures a fresh block
    OneShot,
    /// Engine wraps around the buffer forever; the whole buffer is returned
    Continuous,
    /// Engine wraps around the buffer forever; halves are returned alternately
    ContinuousSplit,
}

impl BufferMode {
    pub const fn name(&self) -> &'static str {
        match self {
            BufferMode::OneShot => "one-shot",
            BufferMode::Continuous => "continuous",
            BufferMode::ContinuousSplit => "continuous-split",
        }
    }
}

impl TryFrom<u8> for BufferMode {
    type Error = CaptureError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(BufferMode::OneShot),
            1 => Ok(BufferMode::Continuous),
            2 => Ok(BufferMode::ContinuousSplit),
            _ => Err(CaptureError::UnsupportedConfiguration),
        }
    }
}

/// Sub-range of the capture buffer that currently holds valid samples
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadyRegion {
    /// First sample, counted from the start of the buffer
    pub offset: usize,
    /// Number of samples
    pub len: usize,
}

impl ReadyRegion {
    pub const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    pub const fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Memory region handed to the transfer engine.
///
/// Built from a `'static` mutable slice, so once a buffer is wrapped nothing
/// but the capture stream can touch it. The descriptor itself is `Copy`: the
/// same buffer can back any number of consecutive sessions.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct CaptureBuffer {
    ptr: NonNull<Sample>,
    len: usize,
}

// SAFETY: the descriptor is only an address and a length. The memory behind
// it is reachable exclusively through the capture stream, which serialises
// every access with critical sections.
unsafe impl Send for CaptureBuffer {}
// SAFETY: see `Send` above; shared references never write through `ptr`.
unsafe impl Sync for CaptureBuffer {}

impl CaptureBuffer {
    /// Take ownership of `buf` for the capture subsystem
    pub fn new(buf: &'static mut [Sample]) -> Self {
        let len = buf.len();
        Self {
            ptr: NonNull::from(buf).cast(),
            len,
        }
    }

    /// Wrap a raw memory region, e.g. a linker-placed section.
    ///
    /// # Safety
    /// `ptr` must be valid for reads and writes of `len` samples for the rest
    /// of the program and must not be accessed by anything but the capture
    /// stream.
    pub const unsafe fn from_raw_parts(ptr: NonNull<Sample>, len: usize) -> Self {
        Self { ptr, len }
    }

    /// Start address as seen by the transfer engine
    pub fn address(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    pub fn as_ptr(&self) -> *const Sample {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Capture stream configuration parameters
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    /// Signal to sample
    pub source: AudioSource,
    /// Priority hint, currently unused
    pub priority: AudioPriority,
    /// Buffer management policy
    pub mode: BufferMode,
    /// Requested sample rate in Hz
    pub sample_rate: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            source: AudioSource::Mic,
            priority: AudioPriority::Rx,
            mode: BufferMode::ContinuousSplit,
            sample_rate: 8_000,
        }
    }
}

impl StreamConfig {
    /// Create a new configuration with validation
    pub fn new(
        source: AudioSource,
        priority: AudioPriority,
        mode: BufferMode,
        sample_rate: u32,
    ) -> Result<Self, CaptureError> {
        if sample_rate == 0 {
            return Err(CaptureError::UnsupportedConfiguration);
        }

        Ok(Self {
            source,
            priority,
            mode,
            sample_rate,
        })
    }
}

/// Running counters of a capture session
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CaptureStats {
    /// Full-transfer events delivered
    pub completions: u32,
    /// Half-transfer events delivered
    pub half_completions: u32,
    /// Delivered events that found no consumer waiting
    pub unclaimed: u32,
}
