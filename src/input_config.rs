//! Input configuration - one physical control and its two propagators
//!
//! An `InputConfig` owns exactly one output propagator (what software sees)
//! and one feedback propagator (what the hardware shows). Both observe the
//! same raw event independently. All edits go through setters here so that a
//! change of response mode also clears remembered state.

use crate::driver::{Color, InputDriver, InputType};
use crate::error::{EngineError, Result};
use crate::propagator::{
    BinaryFeedback, FeedbackPropagator, FeedbackState, OutputPropagator, OutputState, Propagate,
    StepFeedback,
};
use crate::response::{check_response_pair, ResponseMode};
use crate::wire::{EventKind, WireEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

/// Identity of an input, derived from its default address.
///
/// Note-on and note-off share an id, pitch bend ids omit the number.
pub fn input_id_for(number: u8, channel: u8, kind: EventKind) -> String {
    match kind {
        EventKind::PitchBend => format!("{}.{}", kind, channel),
        EventKind::NoteOn | EventKind::NoteOff | EventKind::NoteOnOff => {
            format!("{}.{}.{}", EventKind::NoteOnOff, channel, number)
        }
        _ => format!("{}.{}.{}", kind, channel, number),
    }
}

/// Id of the input that would have produced `event`
pub fn input_id_for_event(event: &WireEvent) -> String {
    input_id_for(event.number, event.channel, event.kind.into())
}

/// Factory defaults of an input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDefault {
    pub number: u8,
    pub channel: u8,
    pub event_kind: EventKind,
    pub response: ResponseMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<u8>,
}

/// User overrides of an input; unset fields fall back to the defaults
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_kind: Option<EventKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<u8>,
    /// Colour name per light state
    #[serde(default)]
    pub light_config: BTreeMap<FeedbackState, String>,
}

/// Configuration and propagation state of a single hardware input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "InputConfigDto", into = "InputConfigDto")]
pub struct InputConfig {
    id: String,
    default: InputDefault,
    nickname: Option<String>,
    light_config: BTreeMap<FeedbackState, String>,
    available_colors: Vec<Color>,
    input_type: InputType,
    overrideable: bool,
    light_steps: Option<usize>,
    output: OutputPropagator,
    feedback: FeedbackPropagator,
}

impl InputConfig {
    /// Fresh configuration for a newly added device
    pub fn from_driver(driver: &InputDriver) -> Result<Self> {
        let default = InputDefault {
            number: driver.number,
            channel: driver.channel,
            event_kind: driver.event_kind,
            response: driver.response,
            value: driver.value,
        };

        Self::assemble(
            default,
            InputOverride::default(),
            driver.available_colors.clone(),
            driver.input_type,
            driver.overrideable,
            driver.light_steps,
            None,
        )
    }

    fn assemble(
        default: InputDefault,
        overrides: InputOverride,
        available_colors: Vec<Color>,
        input_type: InputType,
        overrideable: bool,
        light_steps: Option<usize>,
        light_response: Option<ResponseMode>,
    ) -> Result<Self> {
        let response = overrides.response.unwrap_or(default.response);

        let output = OutputPropagator::new(
            default.response,
            response,
            overrides.event_kind.unwrap_or(default.event_kind),
            overrides.number.unwrap_or(default.number),
            overrides.channel.unwrap_or(default.channel),
            overrides.value.or(default.value),
        )?;

        let mut config = Self {
            id: input_id_for(default.number, default.channel, default.event_kind),
            default,
            nickname: overrides.nickname,
            light_config: BTreeMap::new(),
            available_colors,
            input_type,
            overrideable,
            light_steps,
            output,
            feedback: FeedbackPropagator::Null,
        };

        let mut light_config = overrides.light_config;
        config.feedback = config.build_feedback(&mut light_config, light_response)?;
        config.light_config = light_config;

        Ok(config)
    }

    /// Light-capable inputs get binary or N-step feedback, others none.
    ///
    /// Light-config entries naming a colour the input cannot show are
    /// dropped from `light_config`.
    fn build_feedback(
        &self,
        light_config: &mut BTreeMap<FeedbackState, String>,
        light_response: Option<ResponseMode>,
    ) -> Result<FeedbackPropagator> {
        let input = self.default.response;
        if input == ResponseMode::Linear || self.available_colors.is_empty() {
            return Ok(FeedbackPropagator::Null);
        }

        let output = light_response.unwrap_or_else(|| {
            let response = self.response();
            if response.is_binary() {
                response
            } else {
                input
            }
        });

        let mut events = BTreeMap::new();
        light_config.retain(|state, name| match self.color_event(name) {
            Ok(event) => {
                events.insert(*state, event);
                true
            }
            Err(_) => {
                warn!(
                    "{}: colour '{}' for state {} is not available, ignoring",
                    self.id(),
                    name,
                    state
                );
                false
            }
        });
        let default_event = self.default_color().map(|c| self.event_for_color(c));

        match self.light_steps {
            Some(n) if n > 2 => {
                let mut steps = BTreeMap::new();
                for index in 0..n {
                    let event = match events.get(&FeedbackState::Step(index)) {
                        Some(e) => Some(*e),
                        None if index == 0 => default_event,
                        None => None,
                    };
                    if let Some(e) = event {
                        steps.insert(index, e);
                    }
                }
                Ok(FeedbackPropagator::Steps(StepFeedback::new(input, output, steps)?))
            }
            _ => {
                let on = events.get(&FeedbackState::On).copied();
                let off = events.get(&FeedbackState::Off).copied().or(default_event);
                Ok(FeedbackPropagator::Binary(BinaryFeedback::new(
                    input, output, on, off,
                )?))
            }
        }
    }

    fn event_for_color(&self, color: &Color) -> WireEvent {
        color.event_for(self.default.number, self.default.channel)
    }

    fn color_event(&self, name: &str) -> Result<WireEvent> {
        self.available_colors
            .iter()
            .find(|c| c.name == name)
            .map(|c| self.event_for_color(c))
            .ok_or_else(|| EngineError::UnknownColor {
                input_id: self.id().to_string(),
                color: name.to_string(),
            })
    }

    /// Route one hardware event through both propagators.
    ///
    /// Returns `(feedback, propagated)`.
    pub fn handle_message(
        &mut self,
        event: WireEvent,
    ) -> Result<(Option<WireEvent>, Option<WireEvent>)> {
        let propagated = self.output.handle_message(event)?;
        let feedback = self.feedback.handle_message(event)?;

        trace!(
            "{} <- {} => propagated={:?} feedback={:?}",
            self.id(),
            event,
            propagated,
            feedback
        );

        Ok((feedback, propagated))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn default(&self) -> &InputDefault {
        &self.default
    }

    pub fn available_colors(&self) -> &[Color] {
        &self.available_colors
    }

    pub fn input_type(&self) -> InputType {
        self.input_type
    }

    pub fn overrideable(&self) -> bool {
        self.overrideable
    }

    pub fn output(&self) -> &OutputPropagator {
        &self.output
    }

    pub fn feedback(&self) -> &FeedbackPropagator {
        &self.feedback
    }

    pub fn light_config(&self) -> &BTreeMap<FeedbackState, String> {
        &self.light_config
    }

    pub fn nickname(&self) -> String {
        self.nickname
            .clone()
            .unwrap_or_else(|| format!("Input {}", self.number()))
    }

    pub fn set_nickname(&mut self, nickname: impl Into<String>) {
        self.nickname = Some(nickname.into());
    }

    pub fn number(&self) -> u8 {
        self.output.number()
    }

    pub fn set_number(&mut self, number: u8) {
        self.output.set_number(number);
    }

    pub fn channel(&self) -> u8 {
        self.output.channel()
    }

    pub fn set_channel(&mut self, channel: u8) {
        self.output.set_channel(channel);
    }

    pub fn event_kind(&self) -> EventKind {
        self.output.event_kind()
    }

    pub fn set_event_kind(&mut self, kind: EventKind) -> Result<()> {
        if !self.eligible_event_kinds().contains(&kind) {
            return Err(EngineError::IneligibleEventKind {
                input_id: self.id().to_string(),
                kind,
            });
        }
        self.output.set_event_kind(kind);
        Ok(())
    }

    /// Value emitted in constant mode
    pub fn value(&self) -> u8 {
        self.output.value()
    }

    pub fn set_value(&mut self, value: u8) {
        self.output.set_value(value);
    }

    pub fn response(&self) -> ResponseMode {
        self.output.output_response()
    }

    /// Change the output response.
    ///
    /// Normalizes the event kind for the new mode and clears the remembered
    /// state of both propagators.
    pub fn set_response(&mut self, response: ResponseMode) -> Result<()> {
        if !self.eligible_responses().contains(&response) {
            return Err(EngineError::IneligibleResponse {
                input_id: self.id().to_string(),
                response,
            });
        }
        check_response_pair(self.default.response, response)?;

        let kind = self.event_kind();
        if response == ResponseMode::Constant {
            if kind == EventKind::NoteOnOff {
                self.output.set_event_kind(EventKind::NoteOn);
            }
        } else if kind.is_single_note() {
            self.output.set_event_kind(self.default.event_kind);
        }

        if response == ResponseMode::Toggle {
            self.feedback.set_output_response(response)?;
        }
        self.output.set_output_response(response)?;

        debug!("{}: response set to {}, state reset", self.id(), response);
        self.reset_state();
        Ok(())
    }

    pub fn light_response(&self) -> Option<ResponseMode> {
        self.feedback.output_response()
    }

    pub fn set_light_response(&mut self, response: ResponseMode) -> Result<()> {
        if !self.eligible_light_responses().contains(&response) {
            return Err(EngineError::UnsupportedLightResponse {
                input_id: self.id().to_string(),
                response,
            });
        }

        self.feedback.set_output_response(response)?;
        self.reset_state();
        Ok(())
    }

    pub fn eligible_responses(&self) -> Vec<ResponseMode> {
        use ResponseMode::*;

        match self.default.response {
            Gate => vec![Gate, Toggle, Constant],
            Toggle => vec![Toggle, Constant],
            Constant => match self.default.event_kind {
                EventKind::NoteOnOff | EventKind::ControlChange => vec![Toggle, Constant],
                _ => vec![Constant],
            },
            Linear => vec![Linear, Constant],
        }
    }

    pub fn eligible_event_kinds(&self) -> Vec<EventKind> {
        use EventKind::*;

        if self.response() == ResponseMode::Constant {
            return vec![NoteOn, NoteOff, ControlChange, ProgramChange];
        }

        if self.default.event_kind == PitchBend {
            return vec![PitchBend];
        }

        vec![NoteOnOff, ControlChange, ProgramChange]
    }

    pub fn eligible_light_responses(&self) -> Vec<ResponseMode> {
        if self.feedback.is_null() {
            return Vec::new();
        }

        match self.default.response {
            ResponseMode::Gate | ResponseMode::Constant => {
                vec![ResponseMode::Gate, ResponseMode::Toggle]
            }
            ResponseMode::Toggle => vec![ResponseMode::Toggle],
            ResponseMode::Linear => Vec::new(),
        }
    }

    pub fn eligible_light_states(&self) -> Vec<FeedbackState> {
        self.feedback.eligible_states()
    }

    pub fn default_color(&self) -> Option<&Color> {
        self.available_colors.iter().find(|c| c.default)
    }

    /// Colour shown in `state`, if one is configured
    pub fn color_for_state(&self, state: FeedbackState) -> Option<&Color> {
        let event = self.feedback.event_for_state(state)?;
        self.available_colors.iter().find(|c| c.matches(&event))
    }

    pub fn set_color_for_state(&mut self, state: FeedbackState, color_name: &str) -> Result<()> {
        if !self.eligible_light_states().contains(&state) && !self.is_unset_step(state) {
            return Err(EngineError::IneligibleState {
                input_id: self.id().to_string(),
                state: state.to_string(),
            });
        }

        let event = self.color_event(color_name)?;
        match (&mut self.feedback, state) {
            (FeedbackPropagator::Binary(p), FeedbackState::On) => p.set_on(Some(event)),
            (FeedbackPropagator::Binary(p), FeedbackState::Off) => p.set_off(Some(event)),
            (FeedbackPropagator::Steps(p), FeedbackState::Step(n)) => p.set_step(n, Some(event)),
            _ => {
                return Err(EngineError::IneligibleState {
                    input_id: self.id.clone(),
                    state: state.to_string(),
                })
            }
        }

        self.light_config.insert(state, color_name.to_string());
        Ok(())
    }

    /// Steps inside the declared range that have no colour yet
    fn is_unset_step(&self, state: FeedbackState) -> bool {
        match (state, self.light_steps) {
            (FeedbackState::Step(n), Some(total)) => {
                matches!(self.feedback, FeedbackPropagator::Steps(_)) && n < total
            }
            _ => false,
        }
    }

    pub fn current_color(&self) -> Option<&Color> {
        self.color_for_state(self.current_light_state())
    }

    /// State observed by software clients
    pub fn current_state(&self) -> OutputState {
        self.output.state()
    }

    pub fn current_light_state(&self) -> FeedbackState {
        self.feedback.state()
    }

    /// Value of the last propagated event
    pub fn current_value(&self) -> Option<u8> {
        self.output.last_emitted().map(|e| e.value)
    }

    /// Restore factory number, channel, event kind and response
    pub fn restore_defaults(&mut self) -> Result<()> {
        self.output.set_number(self.default.number);
        self.output.set_channel(self.default.channel);
        self.output.set_event_kind(self.default.event_kind);
        self.set_response(self.default.response)
    }

    /// Back to the unbound state on both propagators
    pub fn reset_state(&mut self) {
        self.output.reset();
        self.feedback.reset();
    }

    /// Copy of this configuration with no remembered state
    pub fn without_state(&self) -> Self {
        let mut copy = self.clone();
        copy.reset_state();
        copy
    }

    /// Same user-visible configuration, ignoring state and colours
    pub fn equivalent(&self, other: &InputConfig) -> bool {
        self.id() == other.id()
            && self.nickname() == other.nickname()
            && self.number() == other.number()
            && self.event_kind() == other.event_kind()
            && self.channel() == other.channel()
            && self.response() == other.response()
            && self.overrideable == other.overrideable
    }

    /// Overrides as persisted
    pub fn overrides(&self) -> InputOverride {
        InputOverride {
            nickname: self.nickname.clone(),
            number: Some(self.number()),
            channel: Some(self.channel()),
            event_kind: Some(self.event_kind()),
            response: Some(self.response()),
            value: Some(self.value()),
            light_config: self.light_config.clone(),
        }
    }
}

/// Persisted shape of an `InputConfig`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputConfigDto {
    pub default: InputDefault,
    #[serde(rename = "override", default)]
    pub overrides: InputOverride,
    #[serde(default)]
    pub available_colors: Vec<Color>,
    #[serde(default)]
    pub input_type: InputType,
    #[serde(default = "default_overrideable")]
    pub overrideable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light_steps: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light_response: Option<ResponseMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_propagated: Option<WireEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_response: Option<WireEvent>,
    /// Cursor of an N-step indicator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light_step: Option<usize>,
}

fn default_overrideable() -> bool {
    true
}

impl TryFrom<InputConfigDto> for InputConfig {
    type Error = EngineError;

    fn try_from(dto: InputConfigDto) -> Result<Self> {
        let mut config = InputConfig::assemble(
            dto.default,
            dto.overrides,
            dto.available_colors,
            dto.input_type,
            dto.overrideable,
            dto.light_steps,
            dto.light_response,
        )?;

        let response = config.response();
        if !config.eligible_responses().contains(&response) {
            return Err(EngineError::IneligibleResponse {
                input_id: config.id().to_string(),
                response,
            });
        }

        config.output.core_mut().set_last_emitted(dto.last_propagated);
        config.feedback.set_last_emitted(dto.last_response);
        if let Some(step) = dto.light_step {
            config.feedback.set_current_step(step);
        }

        Ok(config)
    }
}

impl From<InputConfig> for InputConfigDto {
    fn from(config: InputConfig) -> Self {
        Self {
            overrides: config.overrides(),
            light_response: config.light_response(),
            last_propagated: config.output.last_emitted(),
            last_response: config.feedback.last_emitted(),
            light_step: config.feedback.current_step(),
            default: config.default,
            available_colors: config.available_colors,
            input_type: config.input_type,
            overrideable: config.overrideable,
            light_steps: config.light_steps,
        }
    }
}
