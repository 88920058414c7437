//! Bidirectional MIDI propagation engine
//!
//! Every physical input of a controller owns two propagators: one turns the
//! raw hardware event into what software clients should see, the other
//! computes the event sent back to the hardware (backlight colour, LED state).
//! Devices route events to their inputs by identity and mirror sustain pedal
//! events to the devices they share with.

pub mod config;
pub mod device_config;
pub mod driver;
pub mod error;
pub mod input_config;
pub mod project;
pub mod propagator;
pub mod response;
pub mod wire;

pub use device_config::{DeviceConfig, KeyboardConfig, Routed, SharedEvent, SustainPeers};
pub use error::{EngineError, Result};
pub use input_config::{InputConfig, InputDefault, InputOverride};
pub use project::{Project, ProjectSnapshot};
pub use propagator::{FeedbackPropagator, FeedbackState, OutputPropagator, OutputState, Propagate};
pub use response::ResponseMode;
pub use wire::{EventKind, WireEvent, WireKind};
