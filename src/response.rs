//! Response modes
//!
//! A response mode describes how a stream of wire events is interpreted or
//! synthesized. The hardware dictates the *input* response of a control; the
//! user picks the *output* response software should observe.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Behavioral contract of an event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// State follows press/release (on while held)
    Gate,
    /// Each qualifying event flips a binary state
    Toggle,
    /// Value passes through unmodified
    Linear,
    /// One fixed value is always emitted
    Constant,
}

/// Input/output combinations that cannot be honored
const ILLOGICAL_PAIRS: &[(ResponseMode, ResponseMode)] = &[
    (ResponseMode::Linear, ResponseMode::Gate),
    (ResponseMode::Linear, ResponseMode::Toggle),
    (ResponseMode::Gate, ResponseMode::Linear),
    (ResponseMode::Toggle, ResponseMode::Linear),
    (ResponseMode::Toggle, ResponseMode::Gate),
    (ResponseMode::Constant, ResponseMode::Linear),
];

impl ResponseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseMode::Gate => "gate",
            ResponseMode::Toggle => "toggle",
            ResponseMode::Linear => "linear",
            ResponseMode::Constant => "constant",
        }
    }

    /// Gate and toggle carry an on/off state
    pub fn is_binary(self) -> bool {
        matches!(self, ResponseMode::Gate | ResponseMode::Toggle)
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reject input/output response pairs with no sensible propagation
pub fn check_response_pair(input: ResponseMode, output: ResponseMode) -> Result<()> {
    if ILLOGICAL_PAIRS.contains(&(input, output)) {
        return Err(EngineError::IllogicalResponse { input, output });
    }
    Ok(())
}
