//! Panel control state - encoder modes, LED power and the ring frame.
//!
//! One encoder plus two buttons drive four control modes. The state
//! lives on the main task; the LED task asks it for a frame, the UI
//! task mirrors it on screen, and the broker task reports brightness
//! changes outward.

use crate::config::NUM_LEDS;
use smart_leds::hsv::{hsv2rgb, Hsv};
use smart_leds::RGB8;

/// Fill color for brightness mode (wheat, easy on the eyes).
const WHEAT: RGB8 = RGB8::new(0xF5, 0xDE, 0xB3);
/// Marker color for position mode.
const RED: RGB8 = RGB8::new(0xFF, 0x00, 0x00);
/// Fill color while in volume mode (LEDs stay dark, color is moot).
const BLUE: RGB8 = RGB8::new(0x00, 0x00, 0xFF);

/// Master brightness while in a fixed-brightness mode.
const FIXED_BRIGHTNESS: u8 = 200;

/// What the encoder currently adjusts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlMode {
    Brightness,
    ColorHue,
    Position,
    Volume,
}

impl ControlMode {
    /// Label shown on the mode line of the display.
    pub fn label(self) -> &'static str {
        match self {
            ControlMode::Brightness => "Brightness",
            ControlMode::ColorHue => "Color Hue",
            ControlMode::Position => "Position",
            ControlMode::Volume => "Volume",
        }
    }

    /// The mode-switch button cycles backwards through the list.
    pub fn prev(self) -> Self {
        match self {
            ControlMode::Brightness => ControlMode::Volume,
            ControlMode::ColorHue => ControlMode::Brightness,
            ControlMode::Position => ControlMode::ColorHue,
            ControlMode::Volume => ControlMode::Position,
        }
    }

    /// Upper bound of the encoder value in this mode (inclusive).
    pub fn max_value(self) -> i32 {
        match self {
            ControlMode::Brightness => 100,
            ControlMode::ColorHue => 255,
            ControlMode::Position => NUM_LEDS as i32 - 1,
            ControlMode::Volume => 100,
        }
    }
}

/// A computed LED ring frame: per-LED colors plus master brightness.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedFrame {
    pub pixels: [RGB8; NUM_LEDS],
    pub brightness: u8,
}

/// The panel's control state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PanelState {
    mode: ControlMode,
    value: i32,
    leds_on: bool,
}

impl Default for PanelState {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelState {
    pub const fn new() -> Self {
        Self {
            mode: ControlMode::Brightness,
            value: 50,
            leds_on: true,
        }
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn leds_on(&self) -> bool {
        self.leds_on
    }

    /// Apply one encoder detent (+1 clockwise, -1 counter-clockwise),
    /// clamped to the current mode's range.
    pub fn encoder_step(&mut self, direction: i32) {
        self.value = (self.value + direction).clamp(0, self.mode.max_value());
    }

    /// Set the value directly (arc widget, broker command), clamped.
    pub fn set_value(&mut self, value: i32) {
        self.value = value.clamp(0, self.mode.max_value());
    }

    /// Encoder push toggles the ring on/off.
    pub fn toggle_power(&mut self) {
        self.leds_on = !self.leds_on;
    }

    pub fn set_power(&mut self, on: bool) {
        self.leds_on = on;
    }

    /// Mode-switch button: previous mode, value re-clamped to the new
    /// range.
    pub fn cycle_mode(&mut self) {
        self.mode = self.mode.prev();
        self.value = self.value.clamp(0, self.mode.max_value());
    }

    /// Master brightness to report on the brightness topic (0-255).
    pub fn master_brightness(&self) -> u8 {
        match self.mode {
            ControlMode::Brightness => scale_percent(self.value),
            ControlMode::Volume => 0,
            _ => FIXED_BRIGHTNESS,
        }
    }

    /// Compute the ring frame for the current state.
    pub fn led_frame(&self) -> LedFrame {
        let off = RGB8::new(0, 0, 0);
        if !self.leds_on {
            return LedFrame {
                pixels: [off; NUM_LEDS],
                brightness: 0,
            };
        }

        match self.mode {
            ControlMode::Brightness => LedFrame {
                pixels: [WHEAT; NUM_LEDS],
                brightness: scale_percent(self.value),
            },
            ControlMode::ColorHue => LedFrame {
                pixels: [hsv2rgb(Hsv {
                    hue: self.value as u8,
                    sat: 255,
                    val: 255,
                }); NUM_LEDS],
                brightness: FIXED_BRIGHTNESS,
            },
            ControlMode::Position => {
                let mut pixels = [off; NUM_LEDS];
                pixels[self.value as usize] = RED;
                LedFrame {
                    pixels,
                    brightness: FIXED_BRIGHTNESS,
                }
            }
            // Volume is a remote-control mode; the ring stays dark.
            ControlMode::Volume => LedFrame {
                pixels: [BLUE; NUM_LEDS],
                brightness: 0,
            },
        }
    }
}

/// Map a 0-100 value onto the 0-255 brightness range.
fn scale_percent(value: i32) -> u8 {
    (value.clamp(0, 100) * 255 / 100) as u8
}
