//! Driver descriptors
//!
//! Immutable, factory-supplied description of a device and its inputs. The
//! catalog that loads these from descriptor files lives outside the engine;
//! the engine only consumes them when a device is added.

use crate::response::ResponseMode;
use crate::wire::{EventKind, WireEvent, WireKind};
use serde::{Deserialize, Serialize};

/// A colour (or LED state) a hardware input can display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Color {
    /// Descriptive name, e.g. "Red" or "Amber"
    pub name: String,
    /// CSS colour used by front ends
    #[serde(default)]
    pub string: String,
    /// Event kind that triggers the colour
    pub event_kind: WireKind,
    /// Value (velocity) that triggers the colour
    pub value: u8,
    /// Is this the colour the device shows by default?
    #[serde(default)]
    pub default: bool,
    /// Light number, if it differs from the input's number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u8>,
}

impl Color {
    /// Event that sets this colour on the input with the given default address
    pub fn event_for(&self, number: u8, channel: u8) -> WireEvent {
        WireEvent::new(
            self.event_kind,
            channel,
            self.number.unwrap_or(number),
            self.value,
        )
    }

    /// Does `event` display this colour? Compared by kind and value.
    pub fn matches(&self, event: &WireEvent) -> bool {
        event.kind == self.event_kind && event.value == self.value
    }
}

/// Physical type of an input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    Pad,
    Knob,
    Slider,
    Wheel,
    Switch,
    Xy,
}

/// Factory defaults of a single input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDriver {
    pub number: u8,
    pub channel: u8,
    pub event_kind: EventKind,
    pub response: ResponseMode,
    /// Constant value the hardware sends, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<u8>,
    #[serde(default)]
    pub input_type: InputType,
    #[serde(default = "default_true")]
    pub overrideable: bool,
    #[serde(default)]
    pub available_colors: Vec<Color>,
    /// Number of light steps; more than two selects an N-step indicator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light_steps: Option<usize>,
}

/// Keyboard section of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyboardDriver {
    pub channel: u8,
    pub n_octaves: u8,
    pub default_octave: u8,
}

/// Factory description of a whole device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDriver {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<KeyboardDriver>,
    #[serde(default)]
    pub inputs: Vec<InputDriver>,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_event_inherits_input_address() {
        let red = Color {
            name: "Red".to_string(),
            string: "#f00".to_string(),
            event_kind: WireKind::NoteOn,
            value: 5,
            default: false,
            number: None,
        };

        let event = red.event_for(36, 2);
        assert_eq!(event, WireEvent::note_on(2, 36, 5));
        assert!(red.matches(&event));
        assert!(!red.matches(&WireEvent::note_on(2, 36, 3)));

        let remote = Color { number: Some(99), ..red };
        assert_eq!(remote.event_for(36, 2).number, 99);
    }

    #[test]
    fn test_input_driver_from_yaml() {
        let yaml = r#"
number: 36
channel: 9
eventKind: noteon/noteoff
response: gate
availableColors:
  - { name: Black, eventKind: noteon, value: 0, default: true }
  - { name: Green, eventKind: noteon, value: 3 }
"#;
        let driver: InputDriver = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(driver.event_kind, EventKind::NoteOnOff);
        assert_eq!(driver.input_type, InputType::Pad);
        assert!(driver.overrideable);
        assert_eq!(driver.available_colors.len(), 2);
        assert!(driver.available_colors[0].default);
    }
}
