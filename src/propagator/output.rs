//! Output propagation - hardware event to the event software clients observe

use super::{emitted_on, Propagate, PropagatorCore};
use crate::error::{EngineError, Result};
use crate::response::ResponseMode;
use crate::wire::{EventKind, WireEvent, WireKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value emitted in constant mode when none is configured
pub const DEFAULT_CONSTANT_VALUE: u8 = 127;

/// Observable state of the software-facing side of an input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputState {
    Off,
    On,
    /// Last value of a continuous or constant stream
    Value(u8),
}

impl fmt::Display for OutputState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputState::Off => f.write_str("off"),
            OutputState::On => f.write_str("on"),
            OutputState::Value(v) => write!(f, "{}", v),
        }
    }
}

/// Remaps hardware events and applies the per-mode value policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPropagator {
    core: PropagatorCore,
    event_kind: EventKind,
    number: u8,
    channel: u8,
    value: u8,
}

impl OutputPropagator {
    pub fn new(
        input_response: ResponseMode,
        output_response: ResponseMode,
        event_kind: EventKind,
        number: u8,
        channel: u8,
        value: Option<u8>,
    ) -> Result<Self> {
        Ok(Self {
            core: PropagatorCore::new(input_response, output_response)?,
            event_kind,
            number: number & 0x7F,
            channel: channel & 0x0F,
            value: value.unwrap_or(DEFAULT_CONSTANT_VALUE) & 0x7F,
        })
    }

    /// Resume from a previously emitted event
    pub fn with_last_emitted(mut self, last: Option<WireEvent>) -> Self {
        self.core.set_last_emitted(last);
        self
    }

    pub fn event_kind(&self) -> EventKind {
        self.event_kind
    }

    pub fn set_event_kind(&mut self, kind: EventKind) {
        self.event_kind = kind;
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn set_number(&mut self, number: u8) {
        self.number = number & 0x7F;
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn set_channel(&mut self, channel: u8) {
        self.channel = channel & 0x0F;
    }

    /// Value emitted in constant mode
    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn set_value(&mut self, value: u8) {
        self.value = value & 0x7F;
    }

    pub fn set_output_response(&mut self, response: ResponseMode) -> Result<()> {
        self.core.set_output_response(response)
    }

    /// Current state as observed by software clients
    pub fn state(&self) -> OutputState {
        let last = self.core.last_emitted();
        let on = if emitted_on(last) {
            OutputState::On
        } else {
            OutputState::Off
        };

        match (self.core.input_response(), self.core.output_response()) {
            (ResponseMode::Constant, ResponseMode::Constant) => OutputState::Off,
            (ResponseMode::Constant, _) => on,
            (_, output) if output.is_binary() => on,
            _ => OutputState::Value(last.map_or(0, |e| e.value)),
        }
    }

    pub fn eligible_states(&self) -> Vec<OutputState> {
        if self.core.output_response().is_binary() {
            vec![OutputState::Off, OutputState::On]
        } else {
            Vec::new()
        }
    }

    pub fn default_state(&self) -> OutputState {
        if self.core.output_response().is_binary() {
            OutputState::Off
        } else {
            OutputState::Value(0)
        }
    }

    /// Next wire kind for state-alternating (gate/toggle) output
    fn next_wire_kind(&self) -> Result<WireKind> {
        match self.event_kind {
            EventKind::NoteOnOff => {
                let last_on = self
                    .core
                    .last_emitted()
                    .map_or(false, |e| e.kind == WireKind::NoteOn);
                Ok(if last_on { WireKind::NoteOff } else { WireKind::NoteOn })
            }
            EventKind::ControlChange => Ok(WireKind::ControlChange),
            EventKind::ProgramChange => Ok(WireKind::ProgramChange),
            EventKind::PitchBend => Ok(WireKind::PitchBend),
            EventKind::NoteOn | EventKind::NoteOff => Err(EngineError::UnmappedEventKind {
                kind: self.event_kind,
                response: self.core.output_response(),
            }),
        }
    }

    /// Wire kind for stateless (linear/constant) output
    fn fixed_wire_kind(&self, value: u8) -> WireKind {
        match self.event_kind {
            EventKind::NoteOnOff if value > 0 => WireKind::NoteOn,
            EventKind::NoteOnOff | EventKind::NoteOff => WireKind::NoteOff,
            EventKind::NoteOn => WireKind::NoteOn,
            EventKind::ControlChange => WireKind::ControlChange,
            EventKind::ProgramChange => WireKind::ProgramChange,
            EventKind::PitchBend => WireKind::PitchBend,
        }
    }

    fn next_value(kind: WireKind, candidate: u8) -> u8 {
        match kind {
            WireKind::NoteOff => 0,
            _ => candidate,
        }
    }

    fn emit(&self, kind: WireKind, value: u8) -> WireEvent {
        WireEvent::new(kind, self.channel, self.number, value)
    }

    fn handle_as_gate(&self, event: WireEvent) -> Result<WireEvent> {
        let kind = self.next_wire_kind()?;
        Ok(self.emit(kind, Self::next_value(kind, event.value)))
    }

    fn handle_as_toggle(&self, event: WireEvent) -> Result<WireEvent> {
        let kind = self.next_wire_kind()?;
        let last = self.core.last_emitted();

        let candidate = match self.core.input_response() {
            // Toggle emulated from a press/release pair: alternate 127/0
            ResponseMode::Gate => {
                if last.map_or(true, |e| e.value == 0) {
                    127
                } else {
                    0
                }
            }
            // Hardware constant carries no state, the flipped state decides
            ResponseMode::Constant => {
                if emitted_on(last) {
                    0
                } else {
                    127
                }
            }
            ResponseMode::Toggle | ResponseMode::Linear => event.value,
        };

        Ok(self.emit(kind, Self::next_value(kind, candidate)))
    }

    fn handle_as_linear(&self, event: WireEvent) -> WireEvent {
        if self.event_kind == EventKind::PitchBend {
            // Keep both data bytes of the bend, only the channel is remapped
            return WireEvent::pitch_bend(self.channel, event.number, event.value);
        }

        self.emit(self.fixed_wire_kind(event.value), event.value)
    }

    fn handle_as_constant(&self) -> WireEvent {
        let kind = match self.event_kind {
            EventKind::NoteOnOff => WireKind::NoteOn,
            _ => self.fixed_wire_kind(self.value),
        };
        self.emit(kind, self.value)
    }
}

impl Propagate for OutputPropagator {
    fn core(&self) -> &PropagatorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PropagatorCore {
        &mut self.core
    }

    fn respond(&mut self, event: WireEvent) -> Result<Option<WireEvent>> {
        let response = match self.core.output_response() {
            ResponseMode::Gate => self.handle_as_gate(event)?,
            ResponseMode::Toggle => self.handle_as_toggle(event)?,
            ResponseMode::Linear => self.handle_as_linear(event),
            ResponseMode::Constant => self.handle_as_constant(),
        };

        Ok(Some(response))
    }
}
