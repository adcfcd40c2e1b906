//! Hardware and scheduler abstraction for the capture stream

pub use crate::error::HalError;
use crate::policy::{EventFlags, TransferFlags};
use crate::timebase::Timebase;
use crate::types::{AudioSource, CaptureBuffer};

/// Converter + timer + transfer unit seen as a single capture engine.
///
/// Every method is called with interrupts disabled and must finish in a
/// handful of register accesses.
pub trait CaptureEngine {
    /// Tick rate of the conversion timebase in Hz
    fn reference_clock_hz(&self) -> u32;

    /// Largest number of samples a single transfer can move
    fn max_transfer_len(&self) -> usize {
        u16::MAX as usize
    }

    /// Check that the transfer unit can write into `buffer`
    fn can_reach(&self, buffer: &CaptureBuffer) -> bool;

    /// Enable converter, timer and transfer unit clocks
    fn power_up(&mut self);

    /// Gate all engine clocks; must be harmless when already off
    fn power_down(&mut self);

    /// Program the conversion trigger period
    fn set_timebase(&mut self, timebase: Timebase);

    /// Route `source` to the converter input
    fn route_source(&mut self, source: AudioSource) -> Result<(), HalError>;

    /// Load buffer address, length and transfer options
    fn load_transfer(&mut self, buffer: &CaptureBuffer, flags: TransferFlags) -> Result<(), HalError>;

    /// Start converting into the loaded transfer
    fn start(&mut self);

    /// Stop the transfer unit and the converter trigger
    fn halt(&mut self);

    /// Returns true while the engine is moving samples
    fn is_running(&self) -> bool;

    /// Completion status bits currently pending
    fn pending_events(&self) -> EventFlags;

    /// Acknowledge all pending status bits
    fn clear_events(&mut self);
}

/// Thread primitives the consumer side parks on.
///
/// Modelled after a preemptive kernel where a thread is first marked as
/// waiting with interrupts disabled and only stops running at its next yield.
/// A wake-up that lands between the two simply cancels the wait.
pub trait Scheduler {
    /// Thread identity
    type Thread: Copy + Eq;
    /// Scheduling priority, larger is more urgent
    type Priority: Ord;

    /// Thread currently running (the interrupted one when called from an ISR)
    fn current(&self) -> Self::Thread;

    /// Priority of `thread`
    fn priority(&self, thread: Self::Thread) -> Self::Priority;

    /// Mark the calling thread as waiting. Called inside a critical section.
    fn wait(&self);

    /// Give up the CPU; returns once the thread is runnable again
    fn yield_now(&self);

    /// Make `thread` runnable. Callable from interrupt context.
    fn wake(&self, thread: Self::Thread);

    /// Ask for a context switch as soon as the current interrupt returns
    fn request_reschedule(&self);
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    //! Mock implementations for testing

    use super::*;
    use core::cell::Cell;

    /// Register-free capture engine recording what the stream asked of it
    #[derive(Debug, Clone)]
    pub struct MockEngine {
        reference_hz: u32,
        max_len: usize,
        reachable_from: usize,
        unrouted: Option<AudioSource>,
        powered: bool,
        running: bool,
        timebase: Option<Timebase>,
        source: Option<AudioSource>,
        transfer: Option<(usize, usize, TransferFlags)>,
        pending: EventFlags,
        starts: u32,
        halts: u32,
        clears: u32,
    }

    impl MockEngine {
        /// Engine with a 1 MHz tick that can reach all of memory
        pub const fn new() -> Self {
            Self {
                reference_hz: 1_000_000,
                max_len: u16::MAX as usize,
                reachable_from: 0,
                unrouted: None,
                powered: false,
                running: false,
                timebase: None,
                source: None,
                transfer: None,
                pending: EventFlags::NONE,
                starts: 0,
                halts: 0,
                clears: 0,
            }
        }

        /// Buffers starting below `addr` are unreachable
        pub const fn with_reachable_from(mut self, addr: usize) -> Self {
            self.reachable_from = addr;
            self
        }

        /// Board without a converter channel for `source`
        pub const fn without_source(mut self, source: AudioSource) -> Self {
            self.unrouted = Some(source);
            self
        }

        pub const fn with_max_transfer_len(mut self, len: usize) -> Self {
            self.max_len = len;
            self
        }

        /// Latch a completion event as the hardware would
        pub fn raise(&mut self, flags: impl Into<EventFlags>) {
            self.pending = self.pending | flags.into();
            if self.pending.contains(EventFlags::COMPLETE) && !self.transfer.map_or(true, |t| t.2.circular) {
                self.running = false;
            }
        }

        pub fn is_powered(&self) -> bool {
            self.powered
        }

        pub fn timebase(&self) -> Option<Timebase> {
            self.timebase
        }

        pub fn source(&self) -> Option<AudioSource> {
            self.source
        }

        /// Loaded transfer as (address, length, flags)
        pub fn transfer(&self) -> Option<(usize, usize, TransferFlags)> {
            self.transfer
        }

        pub fn starts(&self) -> u32 {
            self.starts
        }

        pub fn halts(&self) -> u32 {
            self.halts
        }

        pub fn clears(&self) -> u32 {
            self.clears
        }
    }

    impl Default for MockEngine {
        fn default() -> Self {
            Self::new()
        }
    }

    impl CaptureEngine for MockEngine {
        fn reference_clock_hz(&self) -> u32 {
            self.reference_hz
        }

        fn max_transfer_len(&self) -> usize {
            self.max_len
        }

        fn can_reach(&self, buffer: &CaptureBuffer) -> bool {
            buffer.address() >= self.reachable_from
        }

        fn power_up(&mut self) {
            self.powered = true;
        }

        fn power_down(&mut self) {
            self.powered = false;
            self.running = false;
        }

        fn set_timebase(&mut self, timebase: Timebase) {
            self.timebase = Some(timebase);
        }

        fn route_source(&mut self, source: AudioSource) -> Result<(), HalError> {
            if self.unrouted == Some(source) {
                return Err(HalError::UnsupportedSource);
            }
            self.source = Some(source);
            Ok(())
        }

        fn load_transfer(&mut self, buffer: &CaptureBuffer, flags: TransferFlags) -> Result<(), HalError> {
            if !self.powered {
                return Err(HalError::NotPowered);
            }
            if buffer.len() > self.max_len {
                return Err(HalError::TransferTooLong);
            }
            self.transfer = Some((buffer.address(), buffer.len(), flags));
            Ok(())
        }

        fn start(&mut self) {
            self.running = true;
            self.starts += 1;
        }

        fn halt(&mut self) {
            self.running = false;
            self.halts += 1;
        }

        fn is_running(&self) -> bool {
            self.running
        }

        fn pending_events(&self) -> EventFlags {
            self.pending
        }

        fn clear_events(&mut self) {
            self.pending = EventFlags::NONE;
            self.clears += 1;
        }
    }

    /// Single-threaded scheduler that only counts calls.
    ///
    /// Good for exercising the interrupt path; a consumer parked on it would
    /// never be resumed, so blocking reads need a threaded scheduler.
    #[derive(Debug, Default)]
    pub struct MockScheduler {
        current_priority: Cell<u8>,
        waits: Cell<u32>,
        wakes: Cell<u32>,
        reschedules: Cell<u32>,
    }

    impl MockScheduler {
        pub const fn new() -> Self {
            Self {
                current_priority: Cell::new(0),
                waits: Cell::new(0),
                wakes: Cell::new(0),
                reschedules: Cell::new(0),
            }
        }

        pub fn set_current_priority(&self, priority: u8) {
            self.current_priority.set(priority);
        }

        pub fn waits(&self) -> u32 {
            self.waits.get()
        }

        pub fn wakes(&self) -> u32 {
            self.wakes.get()
        }

        pub fn reschedules(&self) -> u32 {
            self.reschedules.get()
        }
    }

    impl Scheduler for MockScheduler {
        /// Threads are identified by their priority
        type Thread = u8;
        type Priority = u8;

        fn current(&self) -> u8 {
            self.current_priority.get()
        }

        fn priority(&self, thread: u8) -> u8 {
            thread
        }

        fn wait(&self) {
            self.waits.set(self.waits.get() + 1);
        }

        fn yield_now(&self) {}

        fn wake(&self, _thread: u8) {
            self.wakes.set(self.wakes.get() + 1);
        }

        fn request_reschedule(&self) {
            self.reschedules.set(self.reschedules.get() + 1);
        }
    }
}
