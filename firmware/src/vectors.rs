//! Device interrupt table
//!
//! Only the capture DMA stream is wired; every other device interrupt stays
//! masked in the NVIC and its slot is left empty.

use crate::mdx_hardware::DMA2_STREAM2_IRQ;
use crate::INPUT_STREAM;

/// STM32F405 device interrupt count
const DEVICE_IRQS: usize = 82;

#[derive(Copy, Clone)]
pub union Vector {
    handler: unsafe extern "C" fn(),
    reserved: usize,
}

const fn build_table() -> [Vector; DEVICE_IRQS] {
    let mut table = [Vector { reserved: 0 }; DEVICE_IRQS];
    table[DMA2_STREAM2_IRQ] = Vector { handler: DMA2_STREAM2 };
    table
}

#[link_section = ".vector_table.interrupts"]
#[no_mangle]
#[used]
pub static __INTERRUPTS: [Vector; DEVICE_IRQS] = build_table();

/// DMA2 stream 2: ADC2 capture half/full transfer
#[no_mangle]
pub unsafe extern "C" fn DMA2_STREAM2() {
    INPUT_STREAM.on_transfer_interrupt();
}
