use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::clock::clock::Clock;
use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::event::NoteEvent;
use crate::poller::DevicePoller;
use crate::publisher::subscriber;

/// Experiment-facing capture session.
///
/// Collects every event the poller publishes, stamping each with the
/// registered clock's reading. Events are appended on the poller thread, so
/// the collection may be read at any time, including mid-stream.
pub struct CaptureController {
    poller: DevicePoller,
    events: Arc<Mutex<Vec<NoteEvent>>>,
    clock: Arc<RwLock<Option<Arc<dyn Clock>>>>,
    started_at: Option<DateTime<Utc>>,
}

impl CaptureController {
    pub fn new(poller: DevicePoller) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let clock: Arc<RwLock<Option<Arc<dyn Clock>>>> = Arc::new(RwLock::new(None));

        let sink = events.clone();
        let clock_ref = clock.clone();
        poller.publisher().subscribe(subscriber(move |event| {
            on_event(&sink, &clock_ref, event);
            Ok(())
        }));

        Self {
            poller,
            events,
            clock,
            started_at: None,
        }
    }

    /// Open the configured device and wrap it in a controller.
    pub fn open(config: &CaptureConfig) -> Result<Self, CaptureError> {
        Ok(Self::new(DevicePoller::open(config)?))
    }

    /// Stamp subsequent events with readings from `clock`.
    pub fn register_clock(&self, clock: Arc<dyn Clock>) {
        *self.clock.write() = Some(clock);
    }

    pub fn clear_clock(&self) {
        *self.clock.write() = None;
    }

    /// Clear previously collected events and start streaming.
    pub fn start_collection(&mut self) -> Result<(), CaptureError> {
        if self.poller.is_streaming() {
            return Err(CaptureError::AlreadyStreaming);
        }
        // Keep the previous table if the stream fails to start
        let previous = std::mem::take(&mut *self.events.lock());
        if let Err(e) = self.poller.start() {
            *self.events.lock() = previous;
            return Err(e);
        }
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Stop streaming. Collected events stay available.
    pub fn stop_collection(&mut self) -> Result<(), CaptureError> {
        self.poller.stop()
    }

    pub fn is_streaming(&self) -> bool {
        self.poller.is_streaming()
    }

    /// Wall-clock time of the last `start_collection`.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Snapshot of everything collected so far.
    pub fn events(&self) -> Vec<NoteEvent> {
        self.events.lock().clone()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }

    /// Move the collected events out, leaving the collection empty.
    pub fn take_events(&self) -> Vec<NoteEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn poller(&self) -> &DevicePoller {
        &self.poller
    }
}

fn on_event(
    events: &Mutex<Vec<NoteEvent>>,
    clock: &RwLock<Option<Arc<dyn Clock>>>,
    event: &NoteEvent,
) {
    let mut event = event.clone();
    if let Some(clock) = clock.read().as_ref() {
        event.global_time = Some(clock.get_time());
    }
    events.lock().push(event);
}
