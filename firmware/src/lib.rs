#![no_std]

//! MDx radio binding of the capture stream: register-level engine,
//! WFI scheduler, interrupt vector and the embassy tasks built on top.

pub use capture_core::*;

pub mod mdx_hardware;
pub mod scheduler;
pub mod tasks;
mod vectors;

pub use crate::mdx_hardware::MdxCaptureEngine;
pub use crate::scheduler::WfiScheduler;
pub use crate::tasks::*;

/// The radio's only input stream
pub type MdxInputStream = InputStream<MdxCaptureEngine, WfiScheduler>;

/// Shared by the DMA2 stream 2 vector and every consumer
pub static INPUT_STREAM: MdxInputStream = InputStream::new(MdxCaptureEngine::new(), WfiScheduler::new());
