//! Wire events and event kinds
//!
//! A `WireEvent` is the decoded form of a single channel-voice MIDI message.
//! The engine only ever consumes and produces these; byte-level decoding and
//! encoding live here so callers at the transport edge can share them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Controller number of the sustain pedal
pub const SUSTAIN_CC: u8 = 64;

/// Kind of a decoded wire event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireKind {
    #[serde(rename = "noteon")]
    NoteOn,
    #[serde(rename = "noteoff")]
    NoteOff,
    #[serde(rename = "controlchange")]
    ControlChange,
    #[serde(rename = "programchange")]
    ProgramChange,
    #[serde(rename = "pitchbend")]
    PitchBend,
}

impl WireKind {
    fn status_nibble(self) -> u8 {
        match self {
            WireKind::NoteOff => 0x80,
            WireKind::NoteOn => 0x90,
            WireKind::ControlChange => 0xB0,
            WireKind::ProgramChange => 0xC0,
            WireKind::PitchBend => 0xE0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WireKind::NoteOn => "noteon",
            WireKind::NoteOff => "noteoff",
            WireKind::ControlChange => "controlchange",
            WireKind::ProgramChange => "programchange",
            WireKind::PitchBend => "pitchbend",
        }
    }
}

impl fmt::Display for WireKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event kind an input is configured to emit.
///
/// Differs from [`WireKind`] by the paired `noteon/noteoff` kind, which
/// alternates between note-on and note-off depending on propagator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "noteon/noteoff")]
    NoteOnOff,
    #[serde(rename = "noteon")]
    NoteOn,
    #[serde(rename = "noteoff")]
    NoteOff,
    #[serde(rename = "controlchange")]
    ControlChange,
    #[serde(rename = "programchange")]
    ProgramChange,
    #[serde(rename = "pitchbend")]
    PitchBend,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::NoteOnOff => "noteon/noteoff",
            EventKind::NoteOn => "noteon",
            EventKind::NoteOff => "noteoff",
            EventKind::ControlChange => "controlchange",
            EventKind::ProgramChange => "programchange",
            EventKind::PitchBend => "pitchbend",
        }
    }

    /// Is this one of the single note kinds (`noteon` or `noteoff`)?
    pub fn is_single_note(self) -> bool {
        matches!(self, EventKind::NoteOn | EventKind::NoteOff)
    }
}

impl From<WireKind> for EventKind {
    /// Note-on and note-off collapse into the paired kind
    fn from(kind: WireKind) -> Self {
        match kind {
            WireKind::NoteOn | WireKind::NoteOff => EventKind::NoteOnOff,
            WireKind::ControlChange => EventKind::ControlChange,
            WireKind::ProgramChange => EventKind::ProgramChange,
            WireKind::PitchBend => EventKind::PitchBend,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "noteon/noteoff" => Ok(EventKind::NoteOnOff),
            "noteon" => Ok(EventKind::NoteOn),
            "noteoff" => Ok(EventKind::NoteOff),
            "controlchange" => Ok(EventKind::ControlChange),
            "programchange" => Ok(EventKind::ProgramChange),
            "pitchbend" => Ok(EventKind::PitchBend),
            other => Err(format!("unknown event kind '{}'", other)),
        }
    }
}

/// Decoded channel-voice MIDI message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WireEvent {
    pub kind: WireKind,
    /// MIDI channel (0-15)
    pub channel: u8,
    /// Note, controller or program number (LSB for pitch bend)
    pub number: u8,
    /// Velocity or controller value (MSB for pitch bend)
    pub value: u8,
}

impl WireEvent {
    /// Build an event, masking fields into their MIDI ranges
    pub fn new(kind: WireKind, channel: u8, number: u8, value: u8) -> Self {
        Self {
            kind,
            channel: channel & 0x0F,
            number: number & 0x7F,
            value: value & 0x7F,
        }
    }

    pub fn note_on(channel: u8, number: u8, value: u8) -> Self {
        Self::new(WireKind::NoteOn, channel, number, value)
    }

    pub fn note_off(channel: u8, number: u8, value: u8) -> Self {
        Self::new(WireKind::NoteOff, channel, number, value)
    }

    pub fn control_change(channel: u8, number: u8, value: u8) -> Self {
        Self::new(WireKind::ControlChange, channel, number, value)
    }

    pub fn program_change(channel: u8, program: u8) -> Self {
        Self::new(WireKind::ProgramChange, channel, program, 0)
    }

    pub fn pitch_bend(channel: u8, lsb: u8, msb: u8) -> Self {
        Self::new(WireKind::PitchBend, channel, lsb, msb)
    }

    /// Parse a channel-voice message from raw bytes.
    ///
    /// System messages, pressure messages and truncated input yield `None`.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let status = *data.first()?;

        // Running status and system messages are not handled
        if !(0x80..0xF0).contains(&status) {
            return None;
        }

        let channel = status & 0x0F;
        let data1 = data.get(1).map(|b| b & 0x7F);
        let data2 = data.get(2).map(|b| b & 0x7F);

        match status & 0xF0 {
            0x80 => Some(Self::note_off(channel, data1?, data2?)),
            0x90 => {
                let (note, velocity) = (data1?, data2?);
                // Note On with velocity 0 is a Note Off
                if velocity == 0 {
                    Some(Self::note_off(channel, note, 0))
                } else {
                    Some(Self::note_on(channel, note, velocity))
                }
            }
            0xB0 => Some(Self::control_change(channel, data1?, data2?)),
            0xC0 => Some(Self::program_change(channel, data1?)),
            0xE0 => Some(Self::pitch_bend(channel, data1?, data2?)),
            _ => None,
        }
    }

    /// Encode the event to MIDI bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let status = self.kind.status_nibble() | (self.channel & 0x0F);
        match self.kind {
            WireKind::ProgramChange => vec![status, self.number & 0x7F],
            _ => vec![status, self.number & 0x7F, self.value & 0x7F],
        }
    }

    /// Is this message "on-ish"? Kinds without a notion of on-ness return `default`.
    pub fn is_press(&self, default: bool) -> bool {
        match self.kind {
            WireKind::NoteOn | WireKind::ControlChange => self.value > 0,
            WireKind::NoteOff => false,
            WireKind::ProgramChange | WireKind::PitchBend => default,
        }
    }

    pub fn is_sustain(&self) -> bool {
        self.kind == WireKind::ControlChange && self.number == SUSTAIN_CC
    }

    pub fn is_note(&self) -> bool {
        matches!(self.kind, WireKind::NoteOn | WireKind::NoteOff)
    }

    /// Copy of this event on another channel
    pub fn with_channel(self, channel: u8) -> Self {
        Self::new(self.kind, channel, self.number, self.value)
    }

    /// 14-bit pitch bend value (0-16383)
    pub fn pitch_bend_value(&self) -> u16 {
        ((self.value as u16) << 7) | self.number as u16
    }
}

impl fmt::Display for WireEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            WireKind::NoteOn => {
                write!(f, "NoteOn ch:{} n:{} v:{}", self.channel + 1, self.number, self.value)
            }
            WireKind::NoteOff => {
                write!(f, "NoteOff ch:{} n:{} v:{}", self.channel + 1, self.number, self.value)
            }
            WireKind::ControlChange => {
                write!(f, "CC ch:{} cc:{} v:{}", self.channel + 1, self.number, self.value)
            }
            WireKind::ProgramChange => {
                write!(f, "ProgramChange ch:{} p:{}", self.channel + 1, self.number)
            }
            WireKind::PitchBend => {
                write!(f, "PitchBend ch:{} v:{}", self.channel + 1, self.pitch_bend_value())
            }
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a whitespace separated hex string such as `"90 24 64"`
pub fn parse_hex(text: &str) -> Option<Vec<u8>> {
    text.split_whitespace()
        .map(|tok| u8::from_str_radix(tok.trim_start_matches("0x"), 16).ok())
        .collect()
}
