//! Capture session manager: exclusivity, buffer placement and engine setup

use core::cell::RefCell;

use critical_section::{CriticalSection, Mutex};
use portable_atomic::{AtomicBool, Ordering};

use crate::error::CaptureError;
use crate::hal::{CaptureEngine, Scheduler};
use crate::timebase::Timebase;
use crate::types::{
    AudioPriority, AudioSource, BufferMode, CaptureBuffer, CaptureStats, ReadyRegion, StreamConfig,
};

/// Consumer currently waiting for the next ready region
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum Parked<T> {
    /// Thread suspended in [`InputStream::read`]
    Thread(T),
    /// Task awaiting [`InputStream::read_async`]
    #[cfg(feature = "async")]
    Task,
}

/// Mutable state of the single capture session.
///
/// Written by thread context only inside critical sections; the interrupt
/// handler is the only writer of `ready` and the only one clearing `parked`
/// while a session runs.
pub(crate) struct SessionState<T> {
    pub(crate) generation: u32,
    pub(crate) mode: BufferMode,
    pub(crate) buffer: Option<CaptureBuffer>,
    pub(crate) ready: ReadyRegion,
    pub(crate) parked: Option<Parked<T>>,
    pub(crate) stats: CaptureStats,
}

impl<T> SessionState<T> {
    const fn new() -> Self {
        Self {
            generation: 0,
            mode: BufferMode::OneShot,
            buffer: None,
            ready: ReadyRegion::new(0, 0),
            parked: None,
            stats: CaptureStats {
                completions: 0,
                half_completions: 0,
                unclaimed: 0,
            },
        }
    }
}

/// Token for an open capture session.
///
/// Not `Clone`: reads take it mutably, so a session has exactly one consumer
/// and a returned block cannot outlive the next read.
#[derive(Debug)]
pub struct SessionHandle {
    pub(crate) generation: u32,
    pub(crate) mode: BufferMode,
    pub(crate) buffer: CaptureBuffer,
}

impl SessionHandle {
    pub fn mode(&self) -> BufferMode {
        self.mode
    }

    /// Configured buffer length in samples
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Samples returned by each read
    pub fn block_len(&self) -> usize {
        self.mode.block_len(self.buffer.len())
    }
}

/// Interrupt-driven audio input stream.
///
/// Owns the capture engine and the one capture session it can run. Meant to
/// live in a `static` shared by the transfer interrupt and the consumer.
pub struct InputStream<E, S: Scheduler> {
    pub(crate) active: AtomicBool,
    pub(crate) engine: Mutex<RefCell<E>>,
    pub(crate) session: Mutex<RefCell<SessionState<S::Thread>>>,
    pub(crate) scheduler: S,
    #[cfg(feature = "async")]
    pub(crate) waker: embassy_sync::waitqueue::AtomicWaker,
}

impl<E, S> InputStream<E, S>
where
    E: CaptureEngine,
    S: Scheduler,
{
    pub const fn new(engine: E, scheduler: S) -> Self {
        Self {
            active: AtomicBool::new(false),
            engine: Mutex::new(RefCell::new(engine)),
            session: Mutex::new(RefCell::new(SessionState::new())),
            scheduler,
            #[cfg(feature = "async")]
            waker: embassy_sync::waitqueue::AtomicWaker::new(),
        }
    }

    /// Open a capture session.
    ///
    /// Continuous modes start converting before this returns; one-shot
    /// sessions capture on each [`read`](Self::read). The priority hint is
    /// accepted for interface compatibility only.
    pub fn open(
        &self,
        source: AudioSource,
        _priority: AudioPriority,
        buffer: CaptureBuffer,
        mode: BufferMode,
        sample_rate: u32,
    ) -> Result<SessionHandle, CaptureError> {
        let reachable = critical_section::with(|cs| self.engine.borrow_ref(cs).can_reach(&buffer));
        if !reachable {
            #[cfg(feature = "defmt")]
            defmt::warn!("capture buffer at {=usize:#x} unreachable by DMA", buffer.address());
            return Err(CaptureError::UnreachableBuffer);
        }

        critical_section::with(|_| {
            self.active
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .map(|_| ())
                .map_err(|_| CaptureError::AlreadyActive)
        })?;

        critical_section::with(|cs| match self.configure(cs, source, buffer, mode, sample_rate) {
            Ok(handle) => {
                #[cfg(feature = "defmt")]
                defmt::info!(
                    "capture open: {} {} {} samples @ {} Hz",
                    source.name(),
                    mode.name(),
                    buffer.len(),
                    sample_rate
                );
                Ok(handle)
            }
            Err(e) => {
                self.engine.borrow_ref_mut(cs).power_down();
                self.active.store(false, Ordering::Release);
                #[cfg(feature = "defmt")]
                defmt::warn!("capture open rolled back: {}", e);
                Err(e)
            }
        })
    }

    /// Open a session from a [`StreamConfig`]
    pub fn open_with(&self, config: &StreamConfig, buffer: CaptureBuffer) -> Result<SessionHandle, CaptureError> {
        self.open(config.source, config.priority, buffer, config.mode, config.sample_rate)
    }

    fn configure(
        &self,
        cs: CriticalSection<'_>,
        source: AudioSource,
        buffer: CaptureBuffer,
        mode: BufferMode,
        sample_rate: u32,
    ) -> Result<SessionHandle, CaptureError> {
        let mut engine = self.engine.borrow_ref_mut(cs);

        let len = buffer.len();
        if len == 0 || len > engine.max_transfer_len() {
            return Err(CaptureError::UnsupportedConfiguration);
        }
        if mode == BufferMode::ContinuousSplit && len % 2 != 0 {
            return Err(CaptureError::UnsupportedConfiguration);
        }

        let timebase = Timebase::for_rate(engine.reference_clock_hz(), sample_rate)?;

        engine.power_up();
        engine.route_source(source)?;
        engine.set_timebase(timebase);
        engine.load_transfer(&buffer, mode.transfer_flags())?;
        engine.clear_events();

        let mut state = self.session.borrow_ref_mut(cs);
        state.generation = state.generation.wrapping_add(1);
        state.mode = mode;
        state.buffer = Some(buffer);
        state.ready = mode.initial_region(len);
        state.parked = None;
        state.stats = CaptureStats::default();

        if mode.arms_on_open() {
            engine.start();
        }

        Ok(SessionHandle {
            generation: state.generation,
            mode,
            buffer,
        })
    }

    /// Stop capturing and release the hardware.
    ///
    /// A no-op for a handle whose session was already stopped.
    pub fn stop(&self, handle: &SessionHandle) {
        critical_section::with(|cs| {
            let mut state = self.session.borrow_ref_mut(cs);
            if !self.active.load(Ordering::Acquire) || state.generation != handle.generation {
                return;
            }

            let mut engine = self.engine.borrow_ref_mut(cs);
            engine.halt();
            engine.clear_events();
            engine.power_down();

            state.buffer = None;
            state.parked = None;
            self.active.store(false, Ordering::Release);

            #[cfg(feature = "defmt")]
            defmt::info!("capture stopped after {} blocks", state.stats.completions);
        });
    }

    /// Returns true while a session owns the engine
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Returns true while a consumer waits for data
    pub fn has_parked_consumer(&self) -> bool {
        critical_section::with(|cs| self.session.borrow_ref(cs).parked.is_some())
    }

    /// Region the next consumer would be handed right now
    pub fn ready_region(&self) -> ReadyRegion {
        critical_section::with(|cs| self.session.borrow_ref(cs).ready)
    }

    /// Counters of the current (or last) session
    pub fn stats(&self) -> CaptureStats {
        critical_section::with(|cs| self.session.borrow_ref(cs).stats)
    }

    /// Run `f` on the engine with interrupts disabled
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut E) -> R) -> R {
        critical_section::with(|cs| f(&mut *self.engine.borrow_ref_mut(cs)))
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }
}
