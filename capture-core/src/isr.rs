//! Transfer-complete interrupt handling

use portable_atomic::Ordering;

use crate::hal::{CaptureEngine, Scheduler};
use crate::policy::{CompletionEvent, EventFlags};
use crate::stream::{InputStream, Parked, SessionState};

impl<E, S> InputStream<E, S>
where
    E: CaptureEngine,
    S: Scheduler,
{
    /// Logical handler for the engine's completion interrupt.
    ///
    /// Call it from the platform interrupt vector. Runs in bounded time,
    /// never allocates and never fails: anything it cannot make sense of is
    /// acknowledged and dropped.
    pub fn on_transfer_interrupt(&self) {
        critical_section::with(|cs| {
            let mut engine = self.engine.borrow_ref_mut(cs);
            let pending = engine.pending_events();

            if self.active.load(Ordering::Acquire) && pending.has_completion() {
                let mut state = self.session.borrow_ref_mut(cs);
                if apply_events(&mut *state, &mut *engine, pending) {
                    self.wake_parked(&mut *state);
                }
            }

            engine.clear_events();
        });
    }

    fn wake_parked(&self, state: &mut SessionState<S::Thread>) {
        match state.parked.take() {
            Some(Parked::Thread(thread)) => {
                self.scheduler.wake(thread);
                let current = self.scheduler.current();
                if self.scheduler.priority(thread) > self.scheduler.priority(current) {
                    self.scheduler.request_reschedule();
                }
            }
            #[cfg(feature = "async")]
            Some(Parked::Task) => self.waker.wake(),
            None => state.stats.unclaimed = state.stats.unclaimed.wrapping_add(1),
        }
    }
}

/// Update the ready region for every pending event, oldest first.
///
/// Returns true if at least one event meant something for the current mode.
fn apply_events<T, E: CaptureEngine>(state: &mut SessionState<T>, engine: &mut E, pending: EventFlags) -> bool {
    let Some(buffer) = state.buffer else {
        return false;
    };

    let mut delivered = false;
    for event in pending.completions() {
        let Some(decision) = state.mode.on_event(event, buffer.len()) else {
            continue;
        };

        state.ready = decision.ready;
        match event {
            CompletionEvent::HalfComplete => {
                state.stats.half_completions = state.stats.half_completions.wrapping_add(1)
            }
            CompletionEvent::Complete => state.stats.completions = state.stats.completions.wrapping_add(1),
        }
        if decision.stop_engine {
            engine.halt();
        }
        delivered = true;
    }

    delivered
}
