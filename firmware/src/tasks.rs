//! Capture and VOX tasks

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use capture_core::{
    block_peak, AudioPriority, AudioSource, BufferMode, CaptureBuffer, CaptureError, LevelMeter, SessionHandle,
};

use crate::INPUT_STREAM;

/// Sample rate used for the noise-floor measurement
pub const CALIBRATION_RATE: u32 = 8_000;

/// Block peaks from the capture task to the VOX task
pub static LEVELS: Channel<CriticalSectionRawMutex, u16, 4> = Channel::new();

/// Take one microphone block with a blocking one-shot read and return its
/// peak level. Runs before the executor has other work, so blocking is fine.
pub fn calibrate_noise_floor(buffer: CaptureBuffer) -> Result<u16, CaptureError> {
    let mut handle = INPUT_STREAM.open(
        AudioSource::Mic,
        AudioPriority::Rx,
        buffer,
        BufferMode::OneShot,
        CALIBRATION_RATE,
    )?;

    let floor = block_peak(INPUT_STREAM.read(&mut handle).iter());
    INPUT_STREAM.stop(&handle);

    #[cfg(feature = "defmt")]
    defmt::info!("🎚️ Noise floor: {}", floor);

    Ok(floor)
}

/// Consume capture blocks and publish their peak levels
#[embassy_executor::task]
pub async fn capture_task(mut handle: SessionHandle) {
    #[cfg(feature = "defmt")]
    defmt::info!("🎙️ Capture task started ({} samples/block)", handle.block_len());

    loop {
        let block = INPUT_STREAM.read_async(&mut handle).await;
        if block.is_empty() {
            #[cfg(feature = "defmt")]
            defmt::warn!("Capture session ended");
            break;
        }

        let peak = block_peak(block.iter());
        if LEVELS.try_send(peak).is_err() {
            #[cfg(feature = "defmt")]
            defmt::trace!("VOX behind, level dropped");
        }
    }
}

/// Voice-operated gate driven by the capture task's levels
#[embassy_executor::task]
pub async fn vox_task(noise_floor: u16) {
    #[cfg(feature = "defmt")]
    defmt::info!("🗣️ VOX task started");

    let mut meter = LevelMeter::new(noise_floor);
    loop {
        let peak = LEVELS.receive().await;
        match meter.update(peak) {
            Some(true) => {
                #[cfg(feature = "defmt")]
                defmt::info!("🔊 VOX open (level {})", meter.level());
            }
            Some(false) => {
                #[cfg(feature = "defmt")]
                defmt::info!("🔇 VOX closed");
            }
            None => {}
        }
    }
}
