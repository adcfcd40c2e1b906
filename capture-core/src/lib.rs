#![cfg_attr(not(feature = "std"), no_std)]

//! # Capture Core
//!
//! Interrupt-driven audio input stream for radio firmware.
//! One ADC/timer/DMA capture engine, one session at a time, and a consumer
//! that parks until the transfer interrupt hands it the next block.

pub mod types;
pub mod error;
pub mod policy;
pub mod timebase;
pub mod hal;
pub mod stream;
mod isr;
pub mod consumer;
pub mod level;


pub use types::*;
pub use error::*;
pub use policy::*;
pub use timebase::Timebase;
pub use hal::{CaptureEngine, Scheduler};
pub use stream::{InputStream, SessionHandle};
pub use consumer::SampleBlock;
pub use level::{block_peak, LevelMeter};

/// Capture library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration: microphone, split buffer, narrowband voice rate
pub fn default_config() -> StreamConfig {
    StreamConfig {
        source: AudioSource::Mic,
        priority: AudioPriority::Rx,
        mode: BufferMode::ContinuousSplit,
        sample_rate: 8_000,
    }
}
