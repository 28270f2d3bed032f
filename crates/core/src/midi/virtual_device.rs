use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use super::device::{DeviceRead, InputDevice};
use super::midi::MidiMessage;

/// In-process input device fed through a [`DeviceInjector`].
///
/// The device reports [`DeviceRead::Closed`] once every injector is dropped.
pub struct VirtualDevice {
    name: String,
    rx: Receiver<MidiMessage>,
}

/// Sending half of a [`VirtualDevice`].
#[derive(Clone)]
pub struct DeviceInjector {
    tx: Sender<MidiMessage>,
}

impl VirtualDevice {
    pub fn new(name: impl Into<String>) -> (Self, DeviceInjector) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                name: name.into(),
                rx,
            },
            DeviceInjector { tx },
        )
    }
}

impl InputDevice for VirtualDevice {
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

impl DeviceInjector {
    /// Queue a decoded message. Returns false if the device has been dropped.
    pub fn send(&self, msg: MidiMessage) -> bool {
        self.tx.send(msg).is_ok()
    }

    /// Queue raw bytes, decoded the same way a hardware port would.
    /// Undecodable bytes are discarded.
    pub fn send_raw(&self, bytes: &[u8]) -> bool {
        match MidiMessage::decode(bytes) {
            Some(msg) => self.send(msg),
            None => {
                log::trace!("Discarding undecodable MIDI bytes: {:02X?}", bytes);
                true
            }
        }
    }
}
