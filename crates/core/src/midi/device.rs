//! MIDI input device handles.
//!
//! The poller only sees the [`InputDevice`] capability. [`MidirDevice`] backs it
//! with a hardware or OS-level port opened through midir.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use midir::{MidiInput, MidiInputConnection};

use super::midi::MidiMessage;
use crate::error::CaptureError;

/// Outcome of a single bounded wait on a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceRead {
    /// A decoded message arrived.
    Message(MidiMessage),
    /// Nothing arrived before the timeout.
    Idle,
    /// The device went away and will produce nothing further.
    Closed,
}

/// A source of decoded MIDI messages.
pub trait InputDevice: Send + 'static {
    /// Name the device was opened under.
    fn name(&self) -> &str;

    /// Wait up to `timeout` for the next message.
    fn recv_timeout(&mut self, timeout: Duration) -> DeviceRead;
}

impl InputDevice for Box<dyn InputDevice> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn recv_timeout(&mut self, timeout: Duration) -> DeviceRead {
        (**self).recv_timeout(timeout)
    }
}

/// Input port opened through midir.
///
/// midir runs its own callback thread; each message is decoded there and
/// forwarded through a channel so reads on this side can time out.
pub struct MidirDevice {
    name: String,
    // Dropping the connection closes the port
    _connection: MidiInputConnection<()>,
    rx: Receiver<MidiMessage>,
}

impl MidirDevice {
    /// Open the first input port whose name contains `device_name`.
    pub fn open(client_name: &str, device_name: &str) -> Result<Self, CaptureError> {
        let midi_in =
            MidiInput::new(client_name).map_err(|e| CaptureError::Driver(e.to_string()))?;

        let in_port = midi_in
            .ports()
            .into_iter()
            .find(|port| {
                midi_in
                    .port_name(port)
                    .map(|name| name.contains(device_name))
                    .unwrap_or(false)
            })
            .ok_or_else(|| CaptureError::DeviceNotFound(device_name.to_string()))?;

        let port_name = midi_in
            .port_name(&in_port)
            .unwrap_or_else(|_| device_name.to_string());

        let (tx, rx) = mpsc::channel();
        let connection = midi_in
            .connect(
                &in_port,
                "midicap-input",
                move |_timestamp, message, _| match MidiMessage::decode(message) {
                    Some(msg) => {
                        // The receiver is gone once the device is dropped
                        let _ = tx.send(msg);
                    }
                    None => log::trace!("Undecodable MIDI bytes: {:02X?}", message),
                },
                (),
            )
            .map_err(|e| CaptureError::Driver(e.to_string()))?;

        log::info!("Opened MIDI input '{}'", port_name);

        Ok(Self {
            name: port_name,
            _connection: connection,
            rx,
        })
    }
}

impl InputDevice for MidirDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn recv_timeout(&mut self, timeout: Duration) -> DeviceRead {
        match self.rx.recv_timeout(timeout) {
            Ok(msg) => DeviceRead::Message(msg),
            Err(RecvTimeoutError::Timeout) => DeviceRead::Idle,
            Err(RecvTimeoutError::Disconnected) => DeviceRead::Closed,
        }
    }
}

/// List the names of all MIDI input ports visible to the driver.
pub fn list_input_ports(client_name: &str) -> Result<Vec<String>, CaptureError> {
    let midi_in = MidiInput::new(client_name).map_err(|e| CaptureError::Driver(e.to_string()))?;

    let ports = midi_in.ports();
    let mut names = Vec::with_capacity(ports.len());
    for (index, port) in ports.iter().enumerate() {
        let name = midi_in
            .port_name(port)
            .unwrap_or_else(|_| format!("Unknown Device {}", index));
        names.push(name);
    }

    Ok(names)
}
