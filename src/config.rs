//! Application-wide constants and compile-time configuration.
//!
//! All hardware pin assignments, timing parameters, queue depths and
//! MQTT topics live here so they can be tuned in one place.

// Wi-Fi / broker

/// Wi-Fi credentials - replace with your own network before flashing.
pub const WIFI_SSID: &str = "changeme";
pub const WIFI_PASSWORD: &str = "changeme";

/// MQTT broker endpoint on the home-automation network.
pub const BROKER_HOST: &str = "192.168.1.10";
pub const BROKER_PORT: u16 = 1883;
pub const BROKER_CLIENT_ID: &str = "artpanel";

// MQTT topics

/// Outbound: panel lifecycle and error reports.
pub const TOPIC_STATUS: &str = "panel/status";
/// Inbound: power commands ("on" / "off" / "toggle").
pub const TOPIC_COMMAND: &str = "panel/command";
/// Bidirectional: LED master brightness (ASCII 0-255).
pub const TOPIC_BRIGHTNESS: &str = "panel/brightness";
/// Inbound: now-playing metadata (JSON with url/track/artist).
pub const TOPIC_MUSIC_INFO: &str = "music/info";

// Artwork pipeline

/// Capacity of the pending-artwork queue.
pub const ARTWORK_QUEUE_DEPTH: usize = 5;

/// How long `Intake::submit` may wait for queue space before
/// reporting `Error::QueueFull` (ms). Keeps the MQTT receive path
/// from stalling behind a slow download.
pub const SUBMIT_WAIT_MS: u64 = 250;

/// Size of the shared artwork download buffer (bytes). Allocated once
/// from PSRAM at startup and never resized.
pub const MAX_IMAGE_SIZE: usize = 200 * 1024;

/// Maximum stored length of an artwork URL (chars).
pub const URL_MAX: usize = 255;

/// Maximum stored length of a track or artist name (chars).
pub const TEXT_MAX: usize = 127;

/// Download attempts per queued record before giving up.
pub const MAX_DOWNLOAD_RETRIES: u32 = 3;

/// Pause between failed attempts (ms).
pub const RETRY_DELAY_MS: u32 = 1000;

/// Settling delay before each connection attempt (ms).
pub const CONNECT_SETTLE_MS: u32 = 5;

/// Grace delay after each attempt so the server can recover (ms).
pub const SERVER_SETTLE_MS: u32 = 50;

/// Yield between partial body reads so the download task cannot
/// starve concurrent work (ms).
pub const READ_YIELD_MS: u32 = 1;

/// HTTP connect/response timeout (ms).
pub const HTTP_TIMEOUT_MS: u64 = 10_000;

// UI handoff

/// Capacity of the UI work queue (requests from other tasks).
pub const UI_QUEUE_DEPTH: usize = 8;

// LED ring

/// Number of LEDs on the WS2812B ring.
pub const NUM_LEDS: usize = 12;

/// LED refresh period (ms).
pub const LED_FRAME_MS: u64 = 30;

// GPIO / I2C (ESP32-S3 panel board)
//
//   LED ring data   → GPIO39
//   I²C SDA         → GPIO41
//   I²C SCL         → GPIO40
//   TCA9535 expander at 0x20; encoder and buttons hang off it.

pub const TCA_I2C_ADDR: u8 = 0x20;

/// I/O expander bit positions.
pub const ENCODER_A_BIT: u8 = 0;
pub const ENCODER_B_BIT: u8 = 1;
pub const ENCODER_SW_BIT: u8 = 2;
/// Back button.
pub const BUTTON_1_BIT: u8 = 3;
/// Mode-switch button.
pub const BUTTON_2_BIT: u8 = 4;

/// Input poll period (ms).
pub const INPUT_POLL_MS: u64 = 5;
