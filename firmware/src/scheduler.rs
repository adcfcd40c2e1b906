//! Single-thread scheduler for bare-metal consumers

use capture_core::Scheduler;
use portable_atomic::{AtomicBool, Ordering};

/// Parks the only thread of the firmware in WFI until the capture interrupt
/// resumes it.
///
/// There is nobody to preempt, so priorities are all equal and reschedule
/// requests are dropped.
pub struct WfiScheduler {
    waiting: AtomicBool,
}

impl WfiScheduler {
    pub const fn new() -> Self {
        Self {
            waiting: AtomicBool::new(false),
        }
    }
}

impl Default for WfiScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for WfiScheduler {
    type Thread = ();
    type Priority = u8;

    fn current(&self) {}

    fn priority(&self, _thread: ()) -> u8 {
        0
    }

    fn wait(&self) {
        self.waiting.store(true, Ordering::Release);
    }

    fn yield_now(&self) {
        loop {
            let primask = cortex_m::register::primask::read();
            cortex_m::interrupt::disable();

            // Masked test-then-sleep; a pending IRQ still ends WFI
            let resumed = !self.waiting.load(Ordering::Acquire);
            if !resumed {
                cortex_m::asm::wfi();
            }

            if primask.is_active() {
                // SAFETY: interrupts were enabled on entry
                unsafe { cortex_m::interrupt::enable() };
            }
            if resumed {
                return;
            }
        }
    }

    fn wake(&self, _thread: ()) {
        self.waiting.store(false, Ordering::Release);
    }

    fn request_reschedule(&self) {}
}
