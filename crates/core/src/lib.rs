//! Background MIDI note capture for timed experiments.
//!
//! A [`DevicePoller`] reads a MIDI input on its own thread, turns note on /
//! note off messages into key-down and key-released [`NoteEvent`]s and fans
//! them out through an [`EventPublisher`]. [`CaptureController`] subscribes to
//! that stream, stamps events with an optional experiment [`Clock`] and keeps
//! them for the rest of the session.

pub use clock::clock::{Clock, ExperimentClock};
pub use config::{CaptureConfig, ConfigError, ConfigManager, ConfigSchema};
pub use controller::CaptureController;
pub use error::{CaptureError, SubscriberError};
pub use event::{EventKind, NoteEvent};
pub use midi::device::{list_input_ports, DeviceRead, InputDevice, MidirDevice};
pub use midi::midi::MidiMessage;
pub use midi::virtual_device::{DeviceInjector, VirtualDevice};
pub use poller::{DevicePoller, PollerConfig};
pub use publisher::{subscriber, EventPublisher, PublishOutcome, Subscriber};
pub use table::EventTable;
pub use tracker::{NoteTracker, ReleasePolicy, StreamState};

mod clock;
mod config;
mod controller;
mod error;
mod event;
mod midi;
mod poller;
mod publisher;
mod table;
mod tracker;
