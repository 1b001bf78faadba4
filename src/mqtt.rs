//! MQTT payload types and topic routing.
//!
//! The broker task (embedded binary) owns the actual client; this
//! module only decides what an inbound publish means. Music metadata
//! arrives as a small JSON object, panel commands as plain text.

use crate::config::{TOPIC_BRIGHTNESS, TOPIC_COMMAND, TOPIC_MUSIC_INFO};
use serde::Deserialize;

/// Now-playing notification as published by the home-automation hub.
///
/// All three fields are required; a payload missing any of them is
/// rejected here so the artwork pipeline never sees a partial record.
#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct MusicInfo<'a> {
    pub url: &'a str,
    pub track: &'a str,
    pub artist: &'a str,
}

/// A routed inbound publish.
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// New now-playing metadata for the artwork pipeline.
    Music(MusicInfo<'a>),
    /// LED power command.
    Power(PowerCommand),
    /// LED master brightness override (0-255).
    Brightness(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerCommand {
    On,
    Off,
    Toggle,
}

/// Map a topic/payload pair onto a panel action. Unknown topics and
/// malformed payloads return `None` and are ignored by the caller.
pub fn route<'a>(topic: &str, payload: &'a [u8]) -> Option<Inbound<'a>> {
    match topic {
        TOPIC_MUSIC_INFO => parse_music_info(payload).map(Inbound::Music),
        TOPIC_COMMAND => parse_power(payload).map(Inbound::Power),
        TOPIC_BRIGHTNESS => parse_brightness(payload).map(Inbound::Brightness),
        _ => None,
    }
}

/// Parse the JSON music-info payload.
pub fn parse_music_info(payload: &[u8]) -> Option<MusicInfo<'_>> {
    serde_json_core::from_slice::<MusicInfo>(payload)
        .ok()
        .map(|(info, _)| info)
}

fn parse_power(payload: &[u8]) -> Option<PowerCommand> {
    match payload {
        b"on" | b"ON" => Some(PowerCommand::On),
        b"off" | b"OFF" => Some(PowerCommand::Off),
        b"toggle" => Some(PowerCommand::Toggle),
        _ => None,
    }
}

fn parse_brightness(payload: &[u8]) -> Option<u8> {
    let text = core::str::from_utf8(payload).ok()?;
    text.trim().parse::<u8>().ok()
}
