//! Engine error taxonomy
//!
//! Every variant is a configuration error: something a corrupted driver,
//! project file or caller asked for that the engine refuses to guess about.
//! Expected outcomes such as "no feedback configured" or "no input matched"
//! are not errors and never show up here.

use crate::response::ResponseMode;
use crate::wire::EventKind;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("input response '{input}' and output response '{output}' is illogical")]
    IllogicalResponse {
        input: ResponseMode,
        output: ResponseMode,
    },

    #[error("event kind '{kind}' cannot be propagated with '{response}' response")]
    UnmappedEventKind {
        kind: EventKind,
        response: ResponseMode,
    },

    #[error("response '{response}' is not eligible for input {input_id}")]
    IneligibleResponse {
        input_id: String,
        response: ResponseMode,
    },

    #[error("event kind '{kind}' is not eligible for input {input_id}")]
    IneligibleEventKind { input_id: String, kind: EventKind },

    #[error("light response '{response}' is not supported for input {input_id}")]
    UnsupportedLightResponse {
        input_id: String,
        response: ResponseMode,
    },

    #[error("light state '{state}' is not eligible for input {input_id}")]
    IneligibleState { input_id: String, state: String },

    #[error("invalid light state '{0}'")]
    InvalidState(String),

    #[error("color '{color}' is not available for input {input_id}")]
    UnknownColor { input_id: String, color: String },

    #[error("duplicate input id '{0}'")]
    DuplicateInput(String),

    #[error("unknown device '{0}'")]
    UnknownDevice(String),

    #[error("duplicate device id '{0}'")]
    DuplicateDevice(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
