#![no_std]
#![no_main]

#[cfg(feature = "defmt")]
use defmt_rtt as _;

// Panic handler
#[cfg(not(feature = "defmt"))]
use panic_halt as _;
#[cfg(feature = "defmt")]
use panic_probe as _;

use embassy_executor::Spawner;
use static_cell::StaticCell;

use rtx_firmware::*;

/// Samples per capture buffer, two 20 ms halves at 8 kHz
const CAPTURE_LEN: usize = 320;
/// One 10 ms block for the noise-floor measurement
const CALIBRATION_LEN: usize = 80;

// Static resources (main SRAM, reachable by DMA2)
static CAPTURE_BUF: StaticCell<[Sample; CAPTURE_LEN]> = StaticCell::new();
static CALIBRATION_BUF: StaticCell<[Sample; CALIBRATION_LEN]> = StaticCell::new();

/// Main firmware entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    #[cfg(feature = "defmt")]
    defmt::info!("🔧 RTX capture firmware v{} starting...", VERSION);

    let noise_floor = match calibrate_noise_floor(CaptureBuffer::new(CALIBRATION_BUF.init([0; CALIBRATION_LEN]))) {
        Ok(floor) => floor,
        Err(_e) => {
            #[cfg(feature = "defmt")]
            defmt::warn!("Calibration failed: {}, gate opens on any signal", _e);
            0
        }
    };

    let config = default_config();
    #[cfg(feature = "defmt")]
    defmt::info!("⚙️ Capture config: {} {} @ {} Hz", config.source.name(), config.mode.name(), config.sample_rate);

    let buffer = CaptureBuffer::new(CAPTURE_BUF.init([0; CAPTURE_LEN]));
    let handle = match INPUT_STREAM.open_with(&config, buffer) {
        Ok(handle) => handle,
        Err(_e) => {
            #[cfg(feature = "defmt")]
            defmt::error!("❌ Capture open failed: {}", _e);
            return;
        }
    };

    #[cfg(feature = "defmt")]
    defmt::info!("🚀 Spawning capture tasks...");

    spawner.must_spawn(capture_task(handle));
    spawner.must_spawn(vox_task(noise_floor));

    #[cfg(feature = "defmt")]
    defmt::info!("✨ Capture firmware ready!");
}
