//! Polled input decoding for the I/O expander word.
//!
//! The encoder and buttons sit behind a TCA9535, so there are no GPIO
//! interrupts to lean on: the main task polls the 16-bit input word and
//! feeds it through [`InputScanner`], which turns level changes into
//! events. All pure logic, tested on the host.

use crate::config::{
    BUTTON_1_BIT, BUTTON_2_BIT, ENCODER_A_BIT, ENCODER_B_BIT, ENCODER_SW_BIT,
};
use heapless::Vec;

/// Decoded input event, at most one per bit per poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputEvent {
    /// Encoder moved one detent; +1 clockwise, -1 counter-clockwise.
    EncoderStep(i32),
    /// Encoder push button pressed.
    PowerToggle,
    /// Back button pressed.
    Back,
    /// Mode-switch button pressed.
    ModeCycle,
}

/// Did this bit fall since the last poll? Inputs are active-low.
fn falling(last: u16, now: u16, bit: u8) -> bool {
    last & (1 << bit) != 0 && now & (1 << bit) == 0
}

fn level(word: u16, bit: u8) -> bool {
    word & (1 << bit) != 0
}

/// Edge detector over successive expander snapshots.
pub struct InputScanner {
    last: u16,
}

impl InputScanner {
    /// Prime with the initial pin word so startup levels do not read
    /// as presses.
    pub fn new(initial: u16) -> Self {
        Self { last: initial }
    }

    /// Decode one freshly polled input word into events.
    pub fn scan(&mut self, word: u16) -> Vec<InputEvent, 4> {
        let mut events: Vec<InputEvent, 4> = Vec::new();

        // Encoder: direction comes from B's level on A's falling edge.
        if falling(self.last, word, ENCODER_A_BIT) {
            let step = if level(word, ENCODER_B_BIT) { 1 } else { -1 };
            let _ = events.push(InputEvent::EncoderStep(step));
        }

        if falling(self.last, word, ENCODER_SW_BIT) {
            let _ = events.push(InputEvent::PowerToggle);
        }
        if falling(self.last, word, BUTTON_1_BIT) {
            let _ = events.push(InputEvent::Back);
        }
        if falling(self.last, word, BUTTON_2_BIT) {
            let _ = events.push(InputEvent::ModeCycle);
        }

        self.last = word;
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_HIGH: u16 = 0xFFFF;

    fn low(bits: &[u8]) -> u16 {
        let mut word = ALL_HIGH;
        for &b in bits {
            word &= !(1 << b);
        }
        word
    }

    #[test]
    fn idle_word_produces_no_events() {
        let mut scanner = InputScanner::new(ALL_HIGH);
        assert!(scanner.scan(ALL_HIGH).is_empty());
    }

    #[test]
    fn clockwise_step_when_b_is_high_on_a_falling_edge() {
        let mut scanner = InputScanner::new(ALL_HIGH);
        let events = scanner.scan(low(&[ENCODER_A_BIT]));
        assert_eq!(events, [InputEvent::EncoderStep(1)]);
    }

    #[test]
    fn counter_clockwise_step_when_b_is_low() {
        let mut scanner = InputScanner::new(ALL_HIGH);
        let events = scanner.scan(low(&[ENCODER_A_BIT, ENCODER_B_BIT]));
        assert_eq!(events, [InputEvent::EncoderStep(-1)]);
    }

    #[test]
    fn held_pin_fires_only_once() {
        let mut scanner = InputScanner::new(ALL_HIGH);
        let pressed = low(&[BUTTON_2_BIT]);
        assert_eq!(scanner.scan(pressed), [InputEvent::ModeCycle]);
        // Still held: no repeat until a release and a fresh press.
        assert!(scanner.scan(pressed).is_empty());
        assert!(scanner.scan(ALL_HIGH).is_empty());
        assert_eq!(scanner.scan(pressed), [InputEvent::ModeCycle]);
    }

    #[test]
    fn initial_low_levels_are_not_presses() {
        // Back button already held at boot.
        let boot = low(&[BUTTON_1_BIT]);
        let mut scanner = InputScanner::new(boot);
        assert!(scanner.scan(boot).is_empty());
        // Release then press registers normally.
        assert!(scanner.scan(ALL_HIGH).is_empty());
        assert_eq!(scanner.scan(boot), [InputEvent::Back]);
    }

    #[test]
    fn simultaneous_edges_all_decode() {
        let mut scanner = InputScanner::new(ALL_HIGH);
        let events = scanner.scan(low(&[ENCODER_A_BIT, ENCODER_SW_BIT, BUTTON_1_BIT]));
        assert_eq!(
            events,
            [
                InputEvent::EncoderStep(1),
                InputEvent::PowerToggle,
                InputEvent::Back
            ]
        );
    }
}
