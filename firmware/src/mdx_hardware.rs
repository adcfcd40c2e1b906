//! MDx (STM32F405) capture engine
//!
//! ADC2 converts one channel per TIM2 update event, DMA2 stream 2 moves the
//! 12-bit results into RAM as half-words.

use capture_core::policy::{EventFlags, TransferFlags};
use capture_core::{AudioSource, CaptureBuffer, CaptureEngine, HalError, Timebase};

// ========================================
// STM32F405 Register Map
// ========================================

const RCC_BASE: u32 = 0x4002_3800;
const GPIOA_BASE: u32 = 0x4002_0000;
const GPIOC_BASE: u32 = 0x4002_0800;
const TIM2_BASE: u32 = 0x4000_0000;
const ADC2_BASE: u32 = 0x4001_2100;
const ADC_COMMON_BASE: u32 = 0x4001_2300;
const DMA2_BASE: u32 = 0x4002_6400;
const NVIC_BASE: u32 = 0xE000_E000;

// RCC
const RCC_AHB1ENR: u32 = 0x30;
const RCC_APB1ENR: u32 = 0x40;
const RCC_APB2ENR: u32 = 0x44;
const RCC_AHB1ENR_GPIOAEN: u32 = 1 << 0;
const RCC_AHB1ENR_GPIOCEN: u32 = 1 << 2;
const RCC_AHB1ENR_DMA2EN: u32 = 1 << 22;
const RCC_APB1ENR_TIM2EN: u32 = 1 << 0;
const RCC_APB2ENR_ADC2EN: u32 = 1 << 9;

// GPIO
const GPIO_MODER: u32 = 0x00;
const GPIO_MODE_ANALOG: u32 = 0b11;

// TIM2
const TIM_CR1: u32 = 0x00;
const TIM_CR2: u32 = 0x04;
const TIM_EGR: u32 = 0x14;
const TIM_CNT: u32 = 0x24;
const TIM_PSC: u32 = 0x28;
const TIM_ARR: u32 = 0x2C;
const TIM_CR1_CEN: u32 = 1 << 0;
const TIM_CR2_MMS_UPDATE: u32 = 0b010 << 4;
const TIM_EGR_UG: u32 = 1 << 0;
/// 84 MHz APB1 timer clock down to a 1 MHz tick
const TIM2_PRESCALER: u32 = 84 - 1;
const TIM2_TICK_HZ: u32 = 1_000_000;

// ADC2
const ADC_CR1: u32 = 0x04;
const ADC_CR2: u32 = 0x08;
const ADC_SMPR1: u32 = 0x0C;
const ADC_SMPR2: u32 = 0x10;
const ADC_SQR1: u32 = 0x2C;
const ADC_SQR3: u32 = 0x34;
const ADC_DR: u32 = 0x4C;
const ADC_CCR: u32 = 0x04;
const ADC_CR1_DISCEN: u32 = 1 << 11;
const ADC_CR2_ADON: u32 = 1 << 0;
const ADC_CR2_DMA: u32 = 1 << 8;
const ADC_CR2_DDS: u32 = 1 << 9;
const ADC_CR2_EXTSEL_TIM2_TRGO: u32 = 0b0110 << 24;
const ADC_CR2_EXTEN_RISING: u32 = 0b01 << 28;
const ADC_CCR_ADCPRE_MASK: u32 = 0b11 << 16;
/// PCLK2 / 8 = 10.5 MHz
const ADC_CCR_ADCPRE_DIV8: u32 = 0b11 << 16;
const ADC_SMP_144_CYCLES: u32 = 0b110;

// DMA2 stream 2
const DMA_LISR: u32 = 0x00;
const DMA_LIFCR: u32 = 0x08;
const DMA_S2CR: u32 = 0x40;
const DMA_S2NDTR: u32 = 0x44;
const DMA_S2PAR: u32 = 0x48;
const DMA_S2M0AR: u32 = 0x4C;
const DMA_SXCR_EN: u32 = 1 << 0;
const DMA_SXCR_HTIE: u32 = 1 << 3;
const DMA_SXCR_TCIE: u32 = 1 << 4;
const DMA_SXCR_CIRC: u32 = 1 << 8;
const DMA_SXCR_MINC: u32 = 1 << 10;
const DMA_SXCR_PSIZE_16: u32 = 0b01 << 11;
const DMA_SXCR_MSIZE_16: u32 = 0b01 << 13;
const DMA_SXCR_PL_HIGH: u32 = 0b10 << 16;
const DMA_SXCR_CHSEL_1: u32 = 1 << 25;
const DMA_TEIF2: u32 = 1 << 19;
const DMA_HTIF2: u32 = 1 << 20;
const DMA_TCIF2: u32 = 1 << 21;

// NVIC
const NVIC_ISER: u32 = 0x100;
const NVIC_ICER: u32 = 0x180;
const NVIC_IPR: u32 = 0x400;
/// DMA2 stream 2 position in the vector table
pub const DMA2_STREAM2_IRQ: usize = 58;
/// Below the RTOS tick, above the UI and codec interrupts
const DMA2_STREAM2_PRIORITY: u8 = 10;
/// Implemented priority bits of the F4 NVIC
const NVIC_PRIO_BITS: u8 = 4;

/// Start of the main SRAM; everything below (CCM included) is off the DMA bus matrix
const DMA_REACHABLE_BASE: usize = 0x2000_0000;

#[inline(always)]
fn read_reg(addr: u32) -> u32 {
    // SAFETY: only called with peripheral register addresses from the map above
    unsafe { core::ptr::read_volatile(addr as *const u32) }
}

#[inline(always)]
fn write_reg(addr: u32, value: u32) {
    // SAFETY: see `read_reg`
    unsafe { core::ptr::write_volatile(addr as *mut u32, value) }
}

#[inline(always)]
fn modify_reg(addr: u32, f: impl FnOnce(u32) -> u32) {
    write_reg(addr, f(read_reg(addr)));
}

/// ADC channel and pin an input is wired to
struct SourcePin {
    port: u32,
    pin: u32,
    channel: u32,
}

const fn source_pin(source: AudioSource) -> SourcePin {
    match source {
        // Microphone preamp on PA3
        AudioSource::Mic => SourcePin {
            port: GPIOA_BASE,
            pin: 3,
            channel: 3,
        },
        // Demodulated RTX audio on PC13
        AudioSource::ExternalRx => SourcePin {
            port: GPIOC_BASE,
            pin: 13,
            channel: 13,
        },
    }
}

/// Capture engine of MD-3x0 / MD-UV3x0 radios
pub struct MdxCaptureEngine {
    powered: bool,
}

impl MdxCaptureEngine {
    pub const fn new() -> Self {
        Self { powered: false }
    }

    fn configure_interrupt(&self, enable: bool) {
        let word = (DMA2_STREAM2_IRQ / 32) as u32 * 4;
        let bit = 1 << (DMA2_STREAM2_IRQ % 32);
        if enable {
            let ipr = (NVIC_BASE + NVIC_IPR + DMA2_STREAM2_IRQ as u32) as *mut u8;
            // SAFETY: byte-wide priority register of this IRQ
            unsafe { core::ptr::write_volatile(ipr, DMA2_STREAM2_PRIORITY << (8 - NVIC_PRIO_BITS)) };
            write_reg(NVIC_BASE + NVIC_ISER + word, bit);
        } else {
            write_reg(NVIC_BASE + NVIC_ICER + word, bit);
        }
    }

    /// Disable the stream and wait until the controller lets go of it
    fn disable_stream(&self) {
        modify_reg(DMA2_BASE + DMA_S2CR, |cr| cr & !DMA_SXCR_EN);
        while read_reg(DMA2_BASE + DMA_S2CR) & DMA_SXCR_EN != 0 {}
    }
}

impl Default for MdxCaptureEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureEngine for MdxCaptureEngine {
    fn reference_clock_hz(&self) -> u32 {
        TIM2_TICK_HZ
    }

    fn can_reach(&self, buffer: &CaptureBuffer) -> bool {
        buffer.address() >= DMA_REACHABLE_BASE
    }

    fn power_up(&mut self) {
        modify_reg(RCC_BASE + RCC_AHB1ENR, |r| {
            r | RCC_AHB1ENR_DMA2EN | RCC_AHB1ENR_GPIOAEN | RCC_AHB1ENR_GPIOCEN
        });
        modify_reg(RCC_BASE + RCC_APB1ENR, |r| r | RCC_APB1ENR_TIM2EN);
        modify_reg(RCC_BASE + RCC_APB2ENR, |r| r | RCC_APB2ENR_ADC2EN);

        // One conversion per trigger, results streamed to DMA
        modify_reg(ADC_COMMON_BASE + ADC_CCR, |r| (r & !ADC_CCR_ADCPRE_MASK) | ADC_CCR_ADCPRE_DIV8);
        write_reg(ADC2_BASE + ADC_CR1, ADC_CR1_DISCEN);
        write_reg(
            ADC2_BASE + ADC_CR2,
            ADC_CR2_EXTEN_RISING | ADC_CR2_EXTSEL_TIM2_TRGO | ADC_CR2_DDS | ADC_CR2_DMA,
        );
        write_reg(ADC2_BASE + ADC_SQR1, 0);

        self.configure_interrupt(true);
        self.powered = true;

        #[cfg(feature = "defmt")]
        defmt::debug!("🔌 ADC2/TIM2/DMA2 clocks on");
    }

    fn power_down(&mut self) {
        if !self.powered {
            return;
        }
        self.halt();
        self.configure_interrupt(false);

        // GPIO clocks stay on, the ports are shared
        modify_reg(RCC_BASE + RCC_APB2ENR, |r| r & !RCC_APB2ENR_ADC2EN);
        modify_reg(RCC_BASE + RCC_APB1ENR, |r| r & !RCC_APB1ENR_TIM2EN);
        modify_reg(RCC_BASE + RCC_AHB1ENR, |r| r & !RCC_AHB1ENR_DMA2EN);
        self.powered = false;

        #[cfg(feature = "defmt")]
        defmt::debug!("🔌 ADC2/TIM2/DMA2 clocks off");
    }

    fn set_timebase(&mut self, timebase: Timebase) {
        write_reg(TIM2_BASE + TIM_CR1, 0);
        write_reg(TIM2_BASE + TIM_PSC, TIM2_PRESCALER);
        write_reg(TIM2_BASE + TIM_ARR, timebase.reload());
        write_reg(TIM2_BASE + TIM_CR2, TIM_CR2_MMS_UPDATE);
        // Latch the prescaler now rather than at the first overflow
        write_reg(TIM2_BASE + TIM_EGR, TIM_EGR_UG);
        write_reg(TIM2_BASE + TIM_CNT, 0);
    }

    fn route_source(&mut self, source: AudioSource) -> Result<(), HalError> {
        if !self.powered {
            return Err(HalError::NotPowered);
        }

        let pin = source_pin(source);
        modify_reg(pin.port + GPIO_MODER, |r| r | (GPIO_MODE_ANALOG << (pin.pin * 2)));

        // Channels 0..9 live in SMPR2, 10..18 in SMPR1, three bits each
        let (smpr, slot) = if pin.channel < 10 {
            (ADC_SMPR2, pin.channel)
        } else {
            (ADC_SMPR1, pin.channel - 10)
        };
        modify_reg(ADC2_BASE + smpr, |r| {
            (r & !(0b111 << (slot * 3))) | (ADC_SMP_144_CYCLES << (slot * 3))
        });
        write_reg(ADC2_BASE + ADC_SQR3, pin.channel);

        Ok(())
    }

    fn load_transfer(&mut self, buffer: &CaptureBuffer, flags: TransferFlags) -> Result<(), HalError> {
        if !self.powered {
            return Err(HalError::NotPowered);
        }
        if buffer.len() > self.max_transfer_len() {
            return Err(HalError::TransferTooLong);
        }

        self.disable_stream();
        self.clear_events();

        let mut cr = DMA_SXCR_CHSEL_1
            | DMA_SXCR_PL_HIGH
            | DMA_SXCR_MSIZE_16
            | DMA_SXCR_PSIZE_16
            | DMA_SXCR_MINC;
        if flags.circular {
            cr |= DMA_SXCR_CIRC;
        }
        if flags.half_complete_irq {
            cr |= DMA_SXCR_HTIE;
        }
        if flags.complete_irq {
            cr |= DMA_SXCR_TCIE;
        }

        write_reg(DMA2_BASE + DMA_S2PAR, ADC2_BASE + ADC_DR);
        write_reg(DMA2_BASE + DMA_S2M0AR, buffer.address() as u32);
        write_reg(DMA2_BASE + DMA_S2NDTR, buffer.len() as u32);
        write_reg(DMA2_BASE + DMA_S2CR, cr);

        Ok(())
    }

    fn start(&mut self) {
        modify_reg(DMA2_BASE + DMA_S2CR, |r| r | DMA_SXCR_EN);
        modify_reg(ADC2_BASE + ADC_CR2, |r| r | ADC_CR2_ADON);
        modify_reg(TIM2_BASE + TIM_CR1, |r| r | TIM_CR1_CEN);
    }

    fn halt(&mut self) {
        modify_reg(TIM2_BASE + TIM_CR1, |r| r & !TIM_CR1_CEN);
        modify_reg(ADC2_BASE + ADC_CR2, |r| r & !ADC_CR2_ADON);
        modify_reg(DMA2_BASE + DMA_S2CR, |r| r & !DMA_SXCR_EN);
    }

    fn is_running(&self) -> bool {
        self.powered && read_reg(DMA2_BASE + DMA_S2CR) & DMA_SXCR_EN != 0
    }

    fn pending_events(&self) -> EventFlags {
        if !self.powered {
            return EventFlags::NONE;
        }

        let lisr = read_reg(DMA2_BASE + DMA_LISR);
        let mut events = EventFlags::NONE;
        if lisr & DMA_HTIF2 != 0 {
            events = events | EventFlags::HALF_COMPLETE;
        }
        if lisr & DMA_TCIF2 != 0 {
            events = events | EventFlags::COMPLETE;
        }
        if lisr & DMA_TEIF2 != 0 {
            events = events | EventFlags::TRANSFER_ERROR;
        }
        events
    }

    fn clear_events(&mut self) {
        if self.powered {
            write_reg(DMA2_BASE + DMA_LIFCR, DMA_TEIF2 | DMA_HTIF2 | DMA_TCIF2);
        }
    }
}
