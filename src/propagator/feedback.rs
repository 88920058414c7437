//! Feedback propagation - events sent back to the hardware
//!
//! Feedback is a pure state-flip lookup: the incoming value is irrelevant,
//! only the remembered last event decides which stored event goes out next.
//! A state with no stored event yields `None` so the hardware is left alone.

use super::{Propagate, PropagatorCore};
use crate::error::{EngineError, Result};
use crate::response::ResponseMode;
use crate::wire::WireEvent;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Logical light state of an input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeedbackState {
    Off,
    On,
    /// Index into an N-step indicator
    Step(usize),
}

impl fmt::Display for FeedbackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedbackState::Off => f.write_str("off"),
            FeedbackState::On => f.write_str("on"),
            FeedbackState::Step(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for FeedbackState {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "off" => Ok(FeedbackState::Off),
            "on" => Ok(FeedbackState::On),
            other => other
                .parse::<usize>()
                .map(FeedbackState::Step)
                .map_err(|_| EngineError::InvalidState(other.to_string())),
        }
    }
}

// String form so states can key JSON maps
impl Serialize for FeedbackState {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FeedbackState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Two-state feedback (e.g. a pad backlight with an on and an off colour)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryFeedback {
    core: PropagatorCore,
    on: Option<WireEvent>,
    off: Option<WireEvent>,
}

impl BinaryFeedback {
    pub fn new(
        input_response: ResponseMode,
        output_response: ResponseMode,
        on: Option<WireEvent>,
        off: Option<WireEvent>,
    ) -> Result<Self> {
        Ok(Self {
            core: PropagatorCore::new(input_response, output_response)?,
            on,
            off,
        })
    }

    pub fn on(&self) -> Option<WireEvent> {
        self.on
    }

    pub fn off(&self) -> Option<WireEvent> {
        self.off
    }

    pub fn set_on(&mut self, event: Option<WireEvent>) {
        self.on = event;
    }

    pub fn set_off(&mut self, event: Option<WireEvent>) {
        self.off = event;
    }

    /// Matches the stored `on` event by kind, channel and value
    fn is_on_message(&self, event: Option<WireEvent>) -> bool {
        match (event, self.on) {
            (Some(e), Some(on)) => {
                e.kind == on.kind && e.channel == on.channel && e.value == on.value
            }
            _ => false,
        }
    }

    pub fn state(&self) -> FeedbackState {
        if self.is_on_message(self.core.last_emitted()) {
            FeedbackState::On
        } else {
            FeedbackState::Off
        }
    }
}

impl Propagate for BinaryFeedback {
    fn core(&self) -> &PropagatorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PropagatorCore {
        &mut self.core
    }

    fn respond(&mut self, _event: WireEvent) -> Result<Option<WireEvent>> {
        Ok(match self.state() {
            FeedbackState::On => self.off,
            _ => self.on,
        })
    }
}

/// Cyclic N-step feedback (e.g. a pad cycling through several colours)
///
/// The step cursor advances on every forwarded event, also onto steps
/// without an event, so a gap never blocks the steps after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFeedback {
    core: PropagatorCore,
    steps: BTreeMap<usize, WireEvent>,
    current_step: usize,
}

impl StepFeedback {
    pub fn new(
        input_response: ResponseMode,
        output_response: ResponseMode,
        steps: BTreeMap<usize, WireEvent>,
    ) -> Result<Self> {
        Ok(Self {
            core: PropagatorCore::new(input_response, output_response)?,
            steps,
            current_step: 0,
        })
    }

    pub fn steps(&self) -> &BTreeMap<usize, WireEvent> {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<WireEvent> {
        self.steps.get(&index).copied()
    }

    pub fn set_step(&mut self, index: usize, event: Option<WireEvent>) {
        match event {
            Some(e) => self.steps.insert(index, e),
            None => self.steps.remove(&index),
        };
    }

    /// Highest configured index + 1
    pub fn n_steps(&self) -> usize {
        self.steps.keys().next_back().map_or(0, |last| last + 1)
    }

    /// Index of the current step, 0 until the first forwarded event
    pub fn state(&self) -> usize {
        self.current_step
    }

    /// Resume at `step`, e.g. from a saved project
    pub fn set_state(&mut self, step: usize) {
        self.current_step = step;
    }
}

impl Propagate for StepFeedback {
    fn core(&self) -> &PropagatorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PropagatorCore {
        &mut self.core
    }

    fn respond(&mut self, _event: WireEvent) -> Result<Option<WireEvent>> {
        let n = self.n_steps();
        if n == 0 {
            return Ok(None);
        }

        self.current_step = if self.current_step + 1 >= n {
            0
        } else {
            self.current_step + 1
        };
        Ok(self.step(self.current_step))
    }

    fn reset(&mut self) {
        self.core.reset();
        self.current_step = 0;
    }
}

/// Feedback propagator of an input, by light arity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackPropagator {
    /// Input has no controllable light
    Null,
    Binary(BinaryFeedback),
    Steps(StepFeedback),
}

impl FeedbackPropagator {
    pub fn handle_message(&mut self, event: WireEvent) -> Result<Option<WireEvent>> {
        match self {
            FeedbackPropagator::Null => Ok(None),
            FeedbackPropagator::Binary(p) => p.handle_message(event),
            FeedbackPropagator::Steps(p) => p.handle_message(event),
        }
    }

    pub fn state(&self) -> FeedbackState {
        match self {
            FeedbackPropagator::Null => FeedbackState::Off,
            FeedbackPropagator::Binary(p) => p.state(),
            FeedbackPropagator::Steps(p) => FeedbackState::Step(p.state()),
        }
    }

    pub fn default_state(&self) -> FeedbackState {
        match self {
            FeedbackPropagator::Steps(_) => FeedbackState::Step(0),
            _ => FeedbackState::Off,
        }
    }

    pub fn eligible_states(&self) -> Vec<FeedbackState> {
        match self {
            FeedbackPropagator::Null => Vec::new(),
            FeedbackPropagator::Binary(_) => vec![FeedbackState::Off, FeedbackState::On],
            FeedbackPropagator::Steps(p) => (0..p.n_steps()).map(FeedbackState::Step).collect(),
        }
    }

    /// Stored event that displays `state`
    pub fn event_for_state(&self, state: FeedbackState) -> Option<WireEvent> {
        match (self, state) {
            (FeedbackPropagator::Binary(p), FeedbackState::On) => p.on(),
            (FeedbackPropagator::Binary(p), FeedbackState::Off) => p.off(),
            (FeedbackPropagator::Steps(p), FeedbackState::Step(n)) => p.step(n),
            _ => None,
        }
    }

    fn core(&self) -> Option<&PropagatorCore> {
        match self {
            FeedbackPropagator::Null => None,
            FeedbackPropagator::Binary(p) => Some(p.core()),
            FeedbackPropagator::Steps(p) => Some(p.core()),
        }
    }

    fn core_mut(&mut self) -> Option<&mut PropagatorCore> {
        match self {
            FeedbackPropagator::Null => None,
            FeedbackPropagator::Binary(p) => Some(p.core_mut()),
            FeedbackPropagator::Steps(p) => Some(p.core_mut()),
        }
    }

    pub fn output_response(&self) -> Option<ResponseMode> {
        self.core().map(PropagatorCore::output_response)
    }

    pub fn set_output_response(&mut self, response: ResponseMode) -> Result<()> {
        match self.core_mut() {
            Some(core) => core.set_output_response(response),
            None => Ok(()),
        }
    }

    pub fn last_emitted(&self) -> Option<WireEvent> {
        self.core().and_then(PropagatorCore::last_emitted)
    }

    pub fn set_last_emitted(&mut self, last: Option<WireEvent>) {
        if let Some(core) = self.core_mut() {
            core.set_last_emitted(last);
        }
    }

    /// Cursor of an N-step indicator
    pub fn current_step(&self) -> Option<usize> {
        match self {
            FeedbackPropagator::Steps(p) => Some(p.state()),
            _ => None,
        }
    }

    pub fn set_current_step(&mut self, step: usize) {
        if let FeedbackPropagator::Steps(p) = self {
            p.set_state(step);
        }
    }

    pub fn reset(&mut self) {
        match self {
            FeedbackPropagator::Null => {}
            FeedbackPropagator::Binary(p) => p.reset(),
            FeedbackPropagator::Steps(p) => p.reset(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FeedbackPropagator::Null)
    }
}
