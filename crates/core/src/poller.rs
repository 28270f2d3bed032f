//! Background device polling.
//!
//! One thread owns the device and the stream state while streaming. It
//! reads with a bounded wait, so clearing the run flag is observed within
//! one poll interval even when the device is silent. Joining the thread
//! hands the device back for the next start, and anything the device queued
//! in the meantime is dropped before the next stream begins.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::midi::device::{DeviceRead, InputDevice, MidirDevice};
use crate::publisher::EventPublisher;
use crate::tracker::{NoteTracker, ReleasePolicy, StreamState};

/// Poller settings taken from [`CaptureConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    pub release_policy: ReleasePolicy,
}

impl Default for PollerConfig {
    fn default() -> Self {
        PollerConfig::from(&CaptureConfig::default())
    }
}

impl From<&CaptureConfig> for PollerConfig {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            release_policy: config.release_policy,
        }
    }
}

type PollerThread = Box<dyn FnOnce() -> Option<StreamExit> + Send>;

/// What the polling thread returns when it exits.
struct StreamExit {
    device: Box<dyn InputDevice>,
    state: StreamState,
    result: Result<(), CaptureError>,
}

pub struct DevicePoller {
    config: PollerConfig,
    publisher: Arc<EventPublisher>,
    /// Present while stopped
    device: Option<Box<dyn InputDevice>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<Option<StreamExit>>>,
    /// State of the last finished stream
    last_state: Option<StreamState>,
}

impl DevicePoller {
    pub fn new(device: impl InputDevice, config: PollerConfig) -> Self {
        Self {
            config,
            publisher: Arc::new(EventPublisher::new()),
            device: Some(Box::new(device)),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            last_state: None,
        }
    }

    /// Open the configured hardware device.
    ///
    /// Fails with [`CaptureError::DeviceNotFound`] when no port matches.
    pub fn open(config: &CaptureConfig) -> Result<Self, CaptureError> {
        let device = MidirDevice::open(&config.client_name, &config.device_name)?;
        Ok(Self::new(device, PollerConfig::from(config)))
    }

    pub fn publisher(&self) -> &Arc<EventPublisher> {
        &self.publisher
    }

    pub fn is_streaming(&self) -> bool {
        self.handle.is_some()
    }

    /// Completed press/release pairs in the last finished stream.
    pub fn note_index(&self) -> Option<u64> {
        self.last_state.as_ref().map(|s| s.note_index)
    }

    /// Start the polling thread. Returns immediately.
    ///
    /// Messages queued by the device while stopped are discarded first.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        self.start_with(|body| {
            thread::Builder::new()
                .name("midicap-poller".to_string())
                .spawn(body)
        })
    }

    fn start_with<S>(&mut self, spawn: S) -> Result<(), CaptureError>
    where
        S: FnOnce(PollerThread) -> io::Result<JoinHandle<Option<StreamExit>>>,
    {
        if self.handle.is_some() {
            return Err(CaptureError::AlreadyStreaming);
        }
        let mut device = self.device.take().ok_or(CaptureError::DeviceUnavailable)?;

        let stale = drain_pending(device.as_mut());
        if stale > 0 {
            log::debug!("Discarded {} MIDI messages queued while stopped", stale);
        }

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let publisher = self.publisher.clone();
        let poll_interval = self.config.poll_interval;

        // The device only moves to the thread once it exists
        let (handoff_tx, handoff_rx) = mpsc::sync_channel::<(Box<dyn InputDevice>, NoteTracker)>(1);
        let body: PollerThread = Box::new(move || {
            let (device, tracker) = handoff_rx.recv().ok()?;
            Some(poll_device(device, tracker, poll_interval, running, publisher))
        });

        let handle = match spawn(body) {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                self.device = Some(device);
                return Err(CaptureError::Driver(format!("failed to spawn poller: {}", e)));
            }
        };

        let device_name = device.name().to_string();
        let tracker = NoteTracker::new(self.config.release_policy);
        if let Err(mpsc::SendError((device, _))) = handoff_tx.send((device, tracker)) {
            self.running.store(false, Ordering::SeqCst);
            self.device = Some(device);
            let _ = handle.join();
            return Err(CaptureError::PollerPanicked);
        }

        self.handle = Some(handle);
        log::info!("MIDI streaming has started on '{}'", device_name);
        Ok(())
    }

    /// Signal the polling thread to exit and wait for it.
    ///
    /// Returns the error that ended the stream early, if any.
    pub fn stop(&mut self) -> Result<(), CaptureError> {
        let handle = self.handle.take().ok_or(CaptureError::StreamNotStarted)?;
        self.running.store(false, Ordering::SeqCst);

        let exit = handle
            .join()
            .ok()
            .flatten()
            .ok_or_else(|| {
                log::error!("MIDI poller thread panicked");
                CaptureError::PollerPanicked
            })?;

        log::info!(
            "MIDI streaming is terminated after {} notes",
            exit.state.note_index
        );
        self.device = Some(exit.device);
        self.last_state = Some(exit.state);
        exit.result
    }

    #[cfg(test)]
    pub(crate) fn take_device(&mut self) -> Option<Box<dyn InputDevice>> {
        self.device.take()
    }
}

impl Drop for DevicePoller {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(e) = self.stop() {
                log::warn!("Error while stopping MIDI poller: {}", e);
            }
        }
    }
}

/// Read and discard whatever the device has already queued.
fn drain_pending(device: &mut dyn InputDevice) -> usize {
    let mut discarded = 0;
    while let DeviceRead::Message(_) = device.recv_timeout(Duration::ZERO) {
        discarded += 1;
    }
    discarded
}

fn poll_device(
    mut device: Box<dyn InputDevice>,
    mut tracker: NoteTracker,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
    publisher: Arc<EventPublisher>,
) -> StreamExit {
    let mut result = Ok(());

    while running.load(Ordering::SeqCst) {
        let msg = match device.recv_timeout(poll_interval) {
            DeviceRead::Message(msg) => msg,
            DeviceRead::Idle => continue,
            DeviceRead::Closed => {
                log::warn!("MIDI device '{}' closed", device.name());
                break;
            }
        };

        if !msg.is_note() {
            log::trace!("Filtered MIDI message {:?}", msg);
            continue;
        }

        match tracker.process(&msg) {
            Ok(Some(event)) => {
                log::debug!("MIDI event {:?}", event);
                publisher.publish(&event);
            }
            Ok(None) => {}
            Err(e) => {
                log::error!("Stopping MIDI stream: {}", e);
                result = Err(e);
                break;
            }
        }
    }

    StreamExit {
        device,
        state: tracker.into_state(),
        result,
    }
}
