//! Consumer side of the stream: parking on the next ready region and the
//! sample views handed back to the caller.

use core::marker::PhantomData;

use portable_atomic::Ordering;

use crate::hal::{CaptureEngine, Scheduler};
use crate::stream::{InputStream, Parked, SessionHandle};
use crate::types::{BufferMode, CaptureBuffer, ReadyRegion, Sample};

/// Read-only view of the samples made ready by the last completion event.
///
/// Borrows the session handle, so it is gone before the next read can start
/// overwriting the memory it points to. In continuous modes the engine keeps
/// writing while the block is held; element accesses are volatile.
#[derive(Debug)]
pub struct SampleBlock<'h> {
    buffer: CaptureBuffer,
    region: ReadyRegion,
    _handle: PhantomData<&'h mut SessionHandle>,
}

impl<'h> SampleBlock<'h> {
    fn new(buffer: CaptureBuffer, region: ReadyRegion) -> Self {
        // The interrupt handler only ever produces regions inside the buffer
        let region = if region.end() <= buffer.len() {
            region
        } else {
            ReadyRegion::new(0, 0)
        };

        Self {
            buffer,
            region,
            _handle: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.region.len
    }

    pub fn is_empty(&self) -> bool {
        self.region.len == 0
    }

    /// Position of the first sample within the capture buffer
    pub fn offset(&self) -> usize {
        self.region.offset
    }

    pub fn region(&self) -> ReadyRegion {
        self.region
    }

    /// Pointer to the first sample of the block
    pub fn as_ptr(&self) -> *const Sample {
        self.buffer.as_ptr().wrapping_add(self.region.offset)
    }

    /// Sample at `index` within the block
    pub fn get(&self, index: usize) -> Option<Sample> {
        if index >= self.region.len {
            return None;
        }
        // SAFETY: offset + index < region.end() <= buffer.len(), checked in
        // `new`; the buffer is valid for the whole program.
        Some(unsafe { core::ptr::read_volatile(self.as_ptr().add(index)) })
    }

    pub fn iter(&self) -> impl Iterator<Item = Sample> + Clone + '_ {
        (0..self.region.len).filter_map(move |i| self.get(i))
    }

    /// Copy as many samples as fit into `dst`, returns the count copied
    pub fn copy_to_slice(&self, dst: &mut [Sample]) -> usize {
        let count = dst.len().min(self.region.len);
        for (i, slot) in dst.iter_mut().take(count).enumerate() {
            if let Some(sample) = self.get(i) {
                *slot = sample;
            }
        }
        count
    }
}

impl<E, S> InputStream<E, S>
where
    E: CaptureEngine,
    S: Scheduler,
{
    /// Block until the next region of samples is ready and return it.
    ///
    /// One-shot sessions start a fresh capture on every call. There is no
    /// timeout: an engine that never completes keeps the caller parked.
    /// A handle whose session was stopped yields an empty block.
    pub fn read<'h>(&self, handle: &'h mut SessionHandle) -> SampleBlock<'h> {
        let me = self.scheduler.current();
        if !self.park(handle, Parked::Thread(me)) {
            return SampleBlock::new(handle.buffer, ReadyRegion::new(0, 0));
        }

        // A resume alone does not mean our data is ready: re-check each time.
        loop {
            let waiting = critical_section::with(|cs| {
                let parked = self.session.borrow_ref(cs).parked.is_some();
                if parked {
                    self.scheduler.wait();
                }
                parked
            });
            if !waiting {
                break;
            }
            self.scheduler.yield_now();
        }

        self.take_ready(handle)
    }

    /// Async flavour of [`read`](Self::read) for executor-driven consumers.
    ///
    /// Dropping the future before it completes withdraws the reader.
    #[cfg(feature = "async")]
    pub async fn read_async<'h>(&self, handle: &'h mut SessionHandle) -> SampleBlock<'h> {
        use core::task::Poll;

        if !self.park(handle, Parked::Task) {
            return SampleBlock::new(handle.buffer, ReadyRegion::new(0, 0));
        }
        let _unpark = UnparkOnDrop { stream: self };

        core::future::poll_fn(|cx| {
            self.waker.register(cx.waker());
            if self.has_parked_consumer() {
                Poll::Pending
            } else {
                Poll::Ready(())
            }
        })
        .await;

        self.take_ready(handle)
    }

    /// Re-arm one-shot captures and record the consumer, atomically with
    /// respect to the transfer interrupt.
    fn park(&self, handle: &SessionHandle, consumer: Parked<S::Thread>) -> bool {
        critical_section::with(|cs| {
            let mut state = self.session.borrow_ref_mut(cs);
            if !self.active.load(Ordering::Acquire) || state.generation != handle.generation {
                #[cfg(feature = "defmt")]
                defmt::warn!("capture read on a stopped session");
                return false;
            }

            if handle.mode == BufferMode::OneShot {
                let mut engine = self.engine.borrow_ref_mut(cs);
                match engine.load_transfer(&handle.buffer, handle.mode.transfer_flags()) {
                    Ok(()) => engine.start(),
                    Err(_e) => {
                        #[cfg(feature = "defmt")]
                        defmt::warn!("one-shot re-arm failed: {}", _e);
                    }
                }
            }

            state.parked = Some(consumer);
            true
        })
    }

    fn take_ready<'h>(&self, handle: &'h mut SessionHandle) -> SampleBlock<'h> {
        let ready = critical_section::with(|cs| {
            let mut state = self.session.borrow_ref_mut(cs);
            state.parked = None;
            state.ready
        });

        SampleBlock::new(handle.buffer, ready)
    }
}

/// Withdraws a parked task whose `read_async` future was dropped before
/// completing, so the next event counts as unclaimed.
#[cfg(feature = "async")]
struct UnparkOnDrop<'a, E, S: Scheduler> {
    stream: &'a InputStream<E, S>,
}

#[cfg(feature = "async")]
impl<E, S: Scheduler> Drop for UnparkOnDrop<'_, E, S> {
    fn drop(&mut self) {
        critical_section::with(|cs| {
            let mut state = self.stream.session.borrow_ref_mut(cs);
            if matches!(state.parked, Some(Parked::Task)) {
                state.parked = None;
            }
        });
    }
}
