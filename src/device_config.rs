//! Device configuration - routing of one device's events to its inputs
//!
//! A device owns its input configurations in driver order. Incoming events
//! are dispatched by input identity; events nobody claims (and keyboard
//! notes) reach software clients untouched. Sustain events are additionally
//! mirrored to the devices listed in `share_sustain`.

use crate::driver::{DeviceDriver, KeyboardDriver};
use crate::error::{EngineError, Result};
use crate::input_config::{input_id_for_event, InputConfig};
use crate::wire::{EventKind, WireEvent};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Keyboard section of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyboardConfig {
    /// Channel the keys transmit on
    pub channel: u8,
    pub n_octaves: u8,
    /// Octave of the lowest key
    pub default_octave: u8,
}

impl From<KeyboardDriver> for KeyboardConfig {
    fn from(driver: KeyboardDriver) -> Self {
        Self {
            channel: driver.channel,
            n_octaves: driver.n_octaves,
            default_octave: driver.default_octave,
        }
    }
}

/// Lookup of sustain-share targets by device id
pub trait SustainPeers {
    /// Keyboard channel of `device_id`, or `None` if it can't be reached
    fn keyboard_channel(&self, device_id: &str) -> Option<u8>;
}

impl SustainPeers for HashMap<String, u8> {
    fn keyboard_channel(&self, device_id: &str) -> Option<u8> {
        self.get(device_id).copied()
    }
}

/// An event to deliver on behalf of another device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedEvent {
    pub device_id: String,
    pub event: WireEvent,
}

/// Result of routing one event through a device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Routed {
    /// Event for the hardware
    pub feedback: Option<WireEvent>,
    /// Event for software clients
    pub propagated: Option<WireEvent>,
    /// Sustain events mirrored to other devices
    pub shared: Vec<SharedEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DeviceConfigDto", into = "DeviceConfigDto")]
pub struct DeviceConfig {
    id: String,
    name: String,
    occurrence_index: usize,
    nickname: Option<String>,
    share_sustain: Vec<String>,
    keyboard: Option<KeyboardConfig>,
    inputs: Vec<InputConfig>,
}

pub fn device_id_for(name: &str, occurrence_index: usize) -> String {
    format!("{} {}", name, occurrence_index)
}

impl DeviceConfig {
    /// Rejects inputs with colliding ids
    pub fn new(
        name: impl Into<String>,
        occurrence_index: usize,
        share_sustain: Vec<String>,
        keyboard: Option<KeyboardConfig>,
        inputs: Vec<InputConfig>,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        for input in &inputs {
            if !seen.insert(input.id()) {
                return Err(EngineError::DuplicateInput(input.id().to_string()));
            }
        }

        let name = name.into();
        Ok(Self {
            id: device_id_for(&name, occurrence_index),
            name,
            occurrence_index,
            nickname: None,
            share_sustain,
            keyboard,
            inputs,
        })
    }

    pub fn from_driver(driver: &DeviceDriver, occurrence_index: usize) -> Result<Self> {
        let inputs = driver
            .inputs
            .iter()
            .map(InputConfig::from_driver)
            .collect::<Result<Vec<_>>>()?;

        Self::new(
            driver.name.clone(),
            occurrence_index,
            Vec::new(),
            driver.keyboard.map(KeyboardConfig::from),
            inputs,
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn occurrence_index(&self) -> usize {
        self.occurrence_index
    }

    /// Also recomputes the device id
    pub fn set_occurrence_index(&mut self, occurrence_index: usize) {
        self.occurrence_index = occurrence_index;
        self.id = device_id_for(&self.name, occurrence_index);
    }

    pub fn nickname(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.name)
    }

    pub fn set_nickname(&mut self, nickname: impl Into<String>) {
        self.nickname = Some(nickname.into());
    }

    pub fn keyboard(&self) -> Option<&KeyboardConfig> {
        self.keyboard.as_ref()
    }

    pub fn inputs(&self) -> &[InputConfig] {
        &self.inputs
    }

    pub fn get_input(&self, id: &str) -> Option<&InputConfig> {
        self.inputs.iter().find(|i| i.id() == id)
    }

    pub fn get_input_mut(&mut self, id: &str) -> Option<&mut InputConfig> {
        self.inputs.iter_mut().find(|i| i.id() == id)
    }

    /// Is no input currently bound to this kind, number and channel?
    pub fn binding_available(&self, kind: EventKind, number: u8, channel: u8) -> bool {
        !self
            .inputs
            .iter()
            .any(|i| i.event_kind() == kind && i.number() == number && i.channel() == channel)
    }

    pub fn share_sustain(&self) -> &[String] {
        &self.share_sustain
    }

    pub fn sharing_with(&self, device_id: &str) -> bool {
        self.share_sustain.iter().any(|id| id == device_id)
    }

    pub fn share_with(&mut self, device_id: impl Into<String>) {
        let device_id = device_id.into();
        if !self.sharing_with(&device_id) {
            self.share_sustain.push(device_id);
        }
    }

    pub fn stop_sharing(&mut self, device_id: &str) {
        self.share_sustain.retain(|id| id != device_id);
    }

    /// Keyboard notes are indistinguishable from pads on the same channel,
    /// so they always pass through.
    fn is_keyboard_event(&self, event: &WireEvent) -> bool {
        self.keyboard
            .map_or(false, |kb| event.is_note() && event.channel == kb.channel)
    }

    /// Route one event; returns `(feedback, propagated)`
    pub fn handle_message(
        &mut self,
        event: WireEvent,
    ) -> Result<(Option<WireEvent>, Option<WireEvent>)> {
        if self.is_keyboard_event(&event) {
            return Ok((None, Some(event)));
        }

        let id = input_id_for_event(&event);
        match self.get_input_mut(&id) {
            Some(input) => input.handle_message(event),
            None => {
                debug!("{}: no input {}, passing through", self.id, id);
                Ok((None, Some(event)))
            }
        }
    }

    /// Route one event and mirror sustain to the devices this one shares with
    pub fn route(&mut self, event: WireEvent, peers: &impl SustainPeers) -> Result<Routed> {
        let (feedback, propagated) = self.handle_message(event)?;

        let shared = if event.is_sustain() {
            self.share_sustain
                .iter()
                .filter_map(|target| match peers.keyboard_channel(target) {
                    Some(channel) => Some(SharedEvent {
                        device_id: target.clone(),
                        event: event.with_channel(channel),
                    }),
                    None => {
                        debug!("{}: sustain target {} unavailable, skipped", self.id, target);
                        None
                    }
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(Routed {
            feedback,
            propagated,
            shared,
        })
    }

    /// Restore factory settings on every input
    pub fn restore_defaults(&mut self) -> Result<()> {
        for input in &mut self.inputs {
            input.restore_defaults()?;
        }
        Ok(())
    }

    /// Copy of this device with every input back in the unbound state
    pub fn without_state(&self) -> Self {
        Self {
            inputs: self.inputs.iter().map(InputConfig::without_state).collect(),
            ..self.clone()
        }
    }
}

/// Persisted shape of a `DeviceConfig`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfigDto {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub occurrence_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default)]
    pub share_sustain: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<KeyboardConfig>,
    #[serde(default)]
    pub inputs: Vec<InputConfig>,
}

impl TryFrom<DeviceConfigDto> for DeviceConfig {
    type Error = EngineError;

    fn try_from(dto: DeviceConfigDto) -> Result<Self> {
        let mut device = DeviceConfig::new(
            dto.name,
            dto.occurrence_index,
            dto.share_sustain,
            dto.keyboard,
            dto.inputs,
        )?;
        device.nickname = dto.nickname;
        Ok(device)
    }
}

impl From<DeviceConfig> for DeviceConfigDto {
    fn from(device: DeviceConfig) -> Self {
        Self {
            id: device.id,
            name: device.name,
            occurrence_index: device.occurrence_index,
            nickname: device.nickname,
            share_sustain: device.share_sustain,
            keyboard: device.keyboard,
            inputs: device.inputs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Color, InputDriver, InputType};
    use crate::response::ResponseMode;
    use crate::wire::{WireKind, SUSTAIN_CC};

    fn pad(number: u8) -> InputDriver {
        InputDriver {
            number,
            channel: 9,
            event_kind: EventKind::NoteOnOff,
            response: ResponseMode::Gate,
            value: None,
            input_type: InputType::Pad,
            overrideable: true,
            available_colors: vec![Color {
                name: "Black".to_string(),
                string: String::new(),
                event_kind: WireKind::NoteOn,
                value: 0,
                default: true,
                number: None,
            }],
            light_steps: None,
        }
    }

    fn sustain_input() -> InputDriver {
        InputDriver {
            number: SUSTAIN_CC,
            channel: 0,
            event_kind: EventKind::ControlChange,
            response: ResponseMode::Gate,
            value: None,
            input_type: InputType::Switch,
            overrideable: true,
            available_colors: Vec::new(),
            light_steps: None,
        }
    }

    fn driver() -> DeviceDriver {
        DeviceDriver {
            name: "Pad Controller".to_string(),
            keyboard: Some(KeyboardDriver {
                channel: 0,
                n_octaves: 2,
                default_octave: 3,
            }),
            inputs: vec![pad(36), pad(37), sustain_input()],
        }
    }

    fn device() -> DeviceConfig {
        DeviceConfig::from_driver(&driver(), 0).unwrap()
    }

    #[test]
    fn test_device_identity() {
        let mut dev = device();
        assert_eq!(dev.id(), "Pad Controller 0");
        assert_eq!(dev.nickname(), "Pad Controller");

        dev.set_occurrence_index(2);
        assert_eq!(dev.id(), "Pad Controller 2");

        dev.set_nickname("Left");
        assert_eq!(dev.nickname(), "Left");
    }

    #[test]
    fn test_routes_to_matching_input() {
        let mut dev = device();
        dev.get_input_mut("noteon/noteoff.9.37")
            .unwrap()
            .set_response(ResponseMode::Toggle)
            .unwrap();

        let (_, propagated) = dev.handle_message(WireEvent::note_on(9, 37, 40)).unwrap();
        assert_eq!(propagated, Some(WireEvent::note_on(9, 37, 127)));

        let (_, propagated) = dev.handle_message(WireEvent::note_off(9, 37, 0)).unwrap();
        assert_eq!(propagated, None);
    }

    #[test]
    fn test_unrouted_event_passes_through() {
        let mut dev = device();
        let event = WireEvent::control_change(4, 99, 12);
        assert_eq!(dev.handle_message(event).unwrap(), (None, Some(event)));
    }

    #[test]
    fn test_keyboard_notes_pass_through() {
        let mut dev = device();
        let note = WireEvent::note_on(0, 60, 90);
        assert_eq!(dev.handle_message(note).unwrap(), (None, Some(note)));
    }

    #[test]
    fn test_sustain_shared_with_peer_channels() {
        let mut dev = device();
        dev.share_with("Synth 0");
        dev.share_with("Offline 0");
        dev.share_with("Synth 0");
        assert_eq!(dev.share_sustain().len(), 2);

        let peers: HashMap<String, u8> = [("Synth 0".to_string(), 5u8)].into_iter().collect();
        let sustain = WireEvent::control_change(0, SUSTAIN_CC, 127);

        let routed = dev.route(sustain, &peers).unwrap();
        assert_eq!(routed.propagated, Some(sustain));
        assert_eq!(
            routed.shared,
            vec![SharedEvent {
                device_id: "Synth 0".to_string(),
                event: WireEvent::control_change(5, SUSTAIN_CC, 127),
            }]
        );

        let routed = dev.route(WireEvent::note_on(9, 36, 1), &peers).unwrap();
        assert!(routed.shared.is_empty());

        dev.stop_sharing("Synth 0");
        assert!(!dev.sharing_with("Synth 0"));
        assert!(dev.sharing_with("Offline 0"));
    }

    #[test]
    fn test_binding_available() {
        let mut dev = device();
        assert!(!dev.binding_available(EventKind::NoteOnOff, 36, 9));
        assert!(dev.binding_available(EventKind::NoteOnOff, 40, 9));

        dev.get_input_mut("noteon/noteoff.9.36").unwrap().set_number(40);
        assert!(dev.binding_available(EventKind::NoteOnOff, 36, 9));
        assert!(!dev.binding_available(EventKind::NoteOnOff, 40, 9));
    }

    #[test]
    fn test_duplicate_inputs_rejected() {
        let mut drv = driver();
        drv.inputs.push(pad(36));
        let err = DeviceConfig::from_driver(&drv, 0).unwrap_err();
        assert_eq!(err, EngineError::DuplicateInput("noteon/noteoff.9.36".to_string()));
    }

    #[test]
    fn test_round_trip_and_without_state() {
        let mut dev = device();
        dev.share_with("Synth 0");
        dev.set_nickname("Left");
        dev.handle_message(WireEvent::note_on(9, 36, 100)).unwrap();

        let json = serde_json::to_string_pretty(&dev).unwrap();
        let restored: DeviceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, dev);

        let fresh = dev.without_state();
        assert_eq!(fresh.get_input("noteon/noteoff.9.36").unwrap().current_value(), None);
        assert_eq!(fresh.nickname(), "Left");
    }

    #[test]
    fn test_restore_defaults() {
        let mut dev = device();
        dev.get_input_mut("noteon/noteoff.9.36").unwrap().set_channel(3);
        dev.restore_defaults().unwrap();
        assert_eq!(dev.get_input("noteon/noteoff.9.36").unwrap().channel(), 9);
    }
}
