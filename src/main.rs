//! artpanel - ESP32-S3 music/LED control panel firmware.
//!
//! Task layout:
//!
//! - **broker**: MQTT session; routes inbound publishes to the artwork
//!   intake and the panel state, reports status/brightness outward.
//! - **fetch worker**: bounded-retry artwork downloads into the PSRAM
//!   buffer, publishes validated images through the UI handoff.
//! - **ui**: owns all display state; drains the UI work queue.
//! - **led**: renders the panel state onto the WS2812B ring.
//! - **input**: polls the TCA9535 expander for encoder/button edges.

#![no_std]
#![no_main]

mod broker;
mod http;

extern crate alloc;

use artpanel::artwork::{
    ArtworkQueue, ArtworkReceiver, DownloadBuffer, FetchWorker, Intake,
};
use artpanel::config;
use artpanel::error::Error;
use artpanel::input::{InputEvent, InputScanner};
use artpanel::panel::PanelState;
use artpanel::ui::{ArtworkSlot, UiHandoff, UiQueue, UiReceiver, UiRequest};
use defmt::{error, info, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_net::{Runner, StackResources};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Delay, Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::rmt::{Channel as RmtChannel, Rmt};
use esp_hal::time::RateExtU32;
use esp_hal::timer::systimer::SystemTimer;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::Blocking;
use esp_hal_smartled::{smartLedBuffer, SmartLedsAdapter};
use esp_wifi::wifi::{
    ClientConfiguration, Configuration, WifiController, WifiDevice, WifiEvent, WifiStaDevice,
    WifiState,
};
use esp_wifi::EspWifiController;
use panic_rtt_target as _;
use smart_leds::{brightness, gamma, SmartLedsWrite};
use static_cell::StaticCell;

/// Panel control state, shared by the input, LED, UI and broker tasks.
pub static PANEL: Mutex<CriticalSectionRawMutex, PanelState> = Mutex::new(PanelState::new());

/// Latest master brightness, for the broker to echo on its topic.
pub static BRIGHTNESS_REPORT: Signal<CriticalSectionRawMutex, u8> = Signal::new();

static ARTWORK_QUEUE: ArtworkQueue = ArtworkQueue::new();
static UI_QUEUE: UiQueue = UiQueue::new();

/// RMT buffer size for the ring: 24 bits per LED plus the reset pulse.
const RMT_BUF: usize = config::NUM_LEDS * 24 + 1;

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    let peripherals = esp_hal::init(esp_hal::Config::default().with_cpu_clock(CpuClock::max()));

    // Internal heap for the network stacks, PSRAM for bulk image data.
    esp_alloc::heap_allocator!(96 * 1024);
    esp_alloc::psram_allocator!(peripherals.PSRAM, esp_hal::psram);

    let systimer = SystemTimer::new(peripherals.SYSTIMER);
    esp_hal_embassy::init(systimer.alarm0);

    info!("artpanel starting");

    // Wi-Fi + network stack
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let mut rng = esp_hal::rng::Rng::new(peripherals.RNG);
    let net_seed = (rng.random() as u64) << 32 | rng.random() as u64;

    static WIFI: StaticCell<EspWifiController<'static>> = StaticCell::new();
    let wifi_ctrl = WIFI.init(
        esp_wifi::init(timg0.timer0, rng, peripherals.RADIO_CLK)
            .expect("esp-wifi init failed"),
    );
    let (device, controller) =
        esp_wifi::wifi::new_with_mode(wifi_ctrl, peripherals.WIFI, WifiStaDevice)
            .expect("wifi driver init failed");

    static RESOURCES: StaticCell<StackResources<6>> = StaticCell::new();
    let (stack, runner) = embassy_net::new(
        device,
        embassy_net::Config::dhcpv4(Default::default()),
        RESOURCES.init(StackResources::new()),
        net_seed,
    );

    // I2C bus for the TCA9535 behind the encoder and buttons.
    let i2c = I2c::new(peripherals.I2C0, I2cConfig::default())
        .expect("i2c init failed")
        .with_sda(peripherals.GPIO41)
        .with_scl(peripherals.GPIO40);

    // WS2812B ring on RMT.
    let rmt = Rmt::new(peripherals.RMT, 80.MHz()).expect("rmt init failed");
    let rmt_buffer = smartLedBuffer!(12);
    let ring = SmartLedsAdapter::new(rmt.channel0, peripherals.GPIO39, rmt_buffer);

    // Artwork pipeline. An allocation failure only disables artwork;
    // the rest of the panel keeps running.
    let ui_handoff = UiHandoff::new(&UI_QUEUE);
    match image_buffer().and_then(DownloadBuffer::new) {
        Ok(buffer) => {
            info!(
                "allocated {} KiB artwork buffer in PSRAM",
                buffer.capacity() / 1024
            );
            let source = http::HttpImageSource::new(stack);
            spawner
                .spawn(fetch_task(
                    ARTWORK_QUEUE.receiver(),
                    source,
                    ui_handoff.clone(),
                    buffer,
                ))
                .unwrap();
        }
        Err(_) => {
            error!(
                "FATAL: could not allocate {} KiB artwork buffer in PSRAM - artwork disabled",
                config::MAX_IMAGE_SIZE / 1024
            );
        }
    }

    spawner.spawn(net_task(runner)).unwrap();
    spawner.spawn(wifi_task(controller)).unwrap();
    spawner
        .spawn(broker::broker_task(
            stack,
            Intake::new(ARTWORK_QUEUE.sender()),
        ))
        .unwrap();
    spawner.spawn(ui_task(UI_QUEUE.receiver())).unwrap();
    spawner.spawn(led_task(ring)).unwrap();
    spawner.spawn(input_task(i2c)).unwrap();

    info!("setup complete");

    loop {
        Timer::after(Duration::from_secs(60)).await;
    }
}

/// Reserve the shared download buffer from the PSRAM heap. Surfaced as
/// `Error::Allocation` instead of aborting so startup can report it.
fn image_buffer() -> Result<&'static mut [u8], Error> {
    let mut storage: alloc::vec::Vec<u8> = alloc::vec::Vec::new();
    if storage.try_reserve_exact(config::MAX_IMAGE_SIZE).is_err() {
        return Err(Error::Allocation);
    }
    storage.resize(config::MAX_IMAGE_SIZE, 0);
    Ok(storage.leak())
}

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static, WifiStaDevice>>) -> ! {
    runner.run().await
}

/// Keep the station associated; reconnect with a backoff on drop.
#[embassy_executor::task]
async fn wifi_task(mut controller: WifiController<'static>) {
    info!("wifi task started");
    loop {
        if esp_wifi::wifi::wifi_state() == WifiState::StaConnected {
            controller.wait_for_event(WifiEvent::StaDisconnected).await;
            warn!("wifi disconnected");
            Timer::after(Duration::from_millis(5000)).await;
        }

        if !matches!(controller.is_started(), Ok(true)) {
            let client_config = Configuration::Client(ClientConfiguration {
                ssid: config::WIFI_SSID.try_into().unwrap(),
                password: config::WIFI_PASSWORD.try_into().unwrap(),
                ..Default::default()
            });
            controller.set_configuration(&client_config).unwrap();
            controller.start_async().await.unwrap();
        }

        match controller.connect_async().await {
            Ok(()) => info!("wifi connected"),
            Err(_) => {
                warn!("wifi connect failed, retrying");
                Timer::after(Duration::from_millis(5000)).await;
            }
        }
    }
}

#[embassy_executor::task]
async fn fetch_task(
    rx: ArtworkReceiver<'static>,
    source: http::HttpImageSource,
    ui: UiHandoff<'static>,
    buffer: DownloadBuffer,
) -> ! {
    FetchWorker::new(rx, source, Delay, ui, buffer).run().await
}

/// The UI task owns all display state. Everything it shows arrives
/// through its own queue; no other task touches widgets directly.
#[embassy_executor::task]
async fn ui_task(rx: UiReceiver<'static>) -> ! {
    let mut artwork = ArtworkSlot::new();
    loop {
        match rx.receive().await {
            UiRequest::TrackInfo(info) => {
                info!(
                    "now playing: {} - {}",
                    info.artist.as_str(),
                    info.track.as_str()
                );
                // Label widgets update here.
            }
            UiRequest::Artwork(desc) => {
                if let Some(prev) = artwork.replace(desc) {
                    // The display library caches decoded images per
                    // descriptor; drop the stale one before rebinding.
                    info!("dropping cached artwork ({} bytes)", prev.size());
                }
                info!("artwork updated: {} bytes", desc.size());
            }
        }
    }
}

#[embassy_executor::task]
async fn led_task(mut ring: SmartLedsAdapter<RmtChannel<Blocking, 0>, RMT_BUF>) -> ! {
    info!("led task started");
    loop {
        let frame = PANEL.lock().await.led_frame();
        let pixels = brightness(gamma(frame.pixels.iter().cloned()), frame.brightness);
        if ring.write(pixels).is_err() {
            warn!("LED write failed");
        }
        Timer::after(Duration::from_millis(config::LED_FRAME_MS)).await;
    }
}

#[embassy_executor::task]
async fn input_task(mut i2c: I2c<'static, Blocking>) -> ! {
    // Prime the scanner with current levels so held pins at boot do
    // not register as presses.
    let initial = read_expander(&mut i2c).unwrap_or(0xFFFF);
    let mut scanner = InputScanner::new(initial);

    loop {
        Timer::after(Duration::from_millis(config::INPUT_POLL_MS)).await;

        let word = match read_expander(&mut i2c) {
            Ok(w) => w,
            Err(_) => {
                warn!("expander read failed");
                continue;
            }
        };

        let events = scanner.scan(word);
        if events.is_empty() {
            continue;
        }

        let mut panel = PANEL.lock().await;
        for event in events {
            match event {
                InputEvent::EncoderStep(direction) => panel.encoder_step(direction),
                InputEvent::PowerToggle => panel.toggle_power(),
                InputEvent::ModeCycle => {
                    panel.cycle_mode();
                    info!("mode: {}", panel.mode().label());
                }
                InputEvent::Back => info!("back button"),
            }
        }
        BRIGHTNESS_REPORT.signal(panel.master_brightness());
    }
}

/// Read both input-port registers of the TCA9535 as one 16-bit word.
fn read_expander(i2c: &mut I2c<'static, Blocking>) -> Result<u16, esp_hal::i2c::master::Error> {
    let mut buf = [0u8; 2];
    i2c.write_read(config::TCA_I2C_ADDR, &[0x00], &mut buf)?;
    Ok(u16::from_le_bytes(buf))
}
