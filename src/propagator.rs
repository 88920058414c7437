//! Propagators - stateful transforms from one event stream to another
//!
//! Every propagator carries the same shell: the hardware-given input
//! response, the user-configured output response and the last event it
//! emitted. The shell decides whether an incoming event reaches the concrete
//! transform at all and records whatever the transform produces:
//! - `OutputPropagator` computes what software clients observe
//! - `FeedbackPropagator` computes what is sent back to the hardware

pub mod feedback;
pub mod output;

#[cfg(test)]
mod tests;

use crate::error::Result;
use crate::response::{check_response_pair, ResponseMode};
use crate::wire::WireEvent;
use tracing::trace;

pub use feedback::{BinaryFeedback, FeedbackPropagator, FeedbackState, StepFeedback};
pub use output::{OutputPropagator, OutputState};

/// State shared by all propagators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagatorCore {
    input_response: ResponseMode,
    output_response: ResponseMode,
    last_emitted: Option<WireEvent>,
}

impl PropagatorCore {
    pub fn new(input_response: ResponseMode, output_response: ResponseMode) -> Result<Self> {
        check_response_pair(input_response, output_response)?;

        Ok(Self {
            input_response,
            output_response,
            last_emitted: None,
        })
    }

    pub fn input_response(&self) -> ResponseMode {
        self.input_response
    }

    pub fn output_response(&self) -> ResponseMode {
        self.output_response
    }

    /// Change the output response. Remembered state is left untouched.
    pub fn set_output_response(&mut self, response: ResponseMode) -> Result<()> {
        check_response_pair(self.input_response, response)?;
        self.output_response = response;
        Ok(())
    }

    pub fn last_emitted(&self) -> Option<WireEvent> {
        self.last_emitted
    }

    /// Restore remembered state, e.g. from a saved project
    pub fn set_last_emitted(&mut self, last: Option<WireEvent>) {
        self.last_emitted = last;
    }

    /// Forget the last emitted event (back to the unbound state)
    pub fn reset(&mut self) {
        self.last_emitted = None;
    }
}

/// The propagation state machine.
///
/// Implementors supply [`Propagate::respond`]; callers drive them through
/// [`Propagate::handle_message`], which applies the input-response policy and
/// updates `last_emitted`.
pub trait Propagate {
    fn core(&self) -> &PropagatorCore;

    fn core_mut(&mut self) -> &mut PropagatorCore;

    /// Compute the event to emit for `event`, given the remembered state
    fn respond(&mut self, event: WireEvent) -> Result<Option<WireEvent>>;

    /// Feed one hardware event through the propagator
    fn handle_message(&mut self, event: WireEvent) -> Result<Option<WireEvent>> {
        let core = self.core();

        let forward = match core.input_response() {
            // Targets without press/release semantics only react to presses
            ResponseMode::Gate => {
                core.output_response() == ResponseMode::Gate || event.is_press(true)
            }
            ResponseMode::Toggle | ResponseMode::Linear | ResponseMode::Constant => true,
        };

        if !forward {
            trace!("Suppressed release under remapped gate: {}", event);
            return Ok(None);
        }

        let response = self.respond(event)?;
        if let Some(emitted) = response {
            self.core_mut().set_last_emitted(Some(emitted));
        }

        Ok(response)
    }

    fn input_response(&self) -> ResponseMode {
        self.core().input_response()
    }

    fn output_response(&self) -> ResponseMode {
        self.core().output_response()
    }

    fn last_emitted(&self) -> Option<WireEvent> {
        self.core().last_emitted()
    }

    fn reset(&mut self) {
        self.core_mut().reset();
    }
}

/// Does an emitted event represent the "on" side of a binary state?
pub(crate) fn emitted_on(event: Option<WireEvent>) -> bool {
    event.map_or(false, |e| e.kind != crate::wire::WireKind::NoteOff && e.value > 0)
}
