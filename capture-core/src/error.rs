//! Error types for stream and hardware operations

/// Reasons a capture session cannot be opened
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CaptureError {
    /// Buffer lies in memory the transfer engine cannot reach
    UnreachableBuffer,
    /// Another session owns the capture hardware
    AlreadyActive,
    /// Source, mode, rate or buffer size not supported by the engine
    UnsupportedConfiguration,
}

impl CaptureError {
    /// Legacy stream id returned by C callers on failure
    pub const fn code(&self) -> i8 {
        -1
    }
}

#[cfg(feature = "std")]
impl core::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CaptureError::UnreachableBuffer => write!(f, "Buffer not reachable by the transfer engine"),
            CaptureError::AlreadyActive => write!(f, "Capture stream already active"),
            CaptureError::UnsupportedConfiguration => write!(f, "Unsupported capture configuration"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CaptureError {}

/// Error types for capture engine operations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError {
    /// Source has no converter channel on this board
    UnsupportedSource,
    /// Transfer length exceeds the engine's counter
    TransferTooLong,
    /// Engine clocks are off
    NotPowered,
}

#[cfg(feature = "std")]
impl core::fmt::Display for HalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HalError::UnsupportedSource => write!(f, "Audio source not routed on this board"),
            HalError::TransferTooLong => write!(f, "Transfer length exceeds engine limit"),
            HalError::NotPowered => write!(f, "Capture engine not powered"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for HalError {}

impl From<HalError> for CaptureError {
    fn from(_: HalError) -> Self {
        CaptureError::UnsupportedConfiguration
    }
}
