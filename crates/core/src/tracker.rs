use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::CaptureError;
use crate::event::{EventKind, NoteEvent};
use crate::midi::midi::MidiMessage;

/// What to do with a release that has no pending press.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePolicy {
    /// Ignore it: no event, no index change.
    #[default]
    Drop,
    /// Treat it as a stream error, ending the capture.
    Error,
}

impl std::str::FromStr for ReleasePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drop" => Ok(ReleasePolicy::Drop),
            "error" => Ok(ReleasePolicy::Error),
            other => Err(format!("unknown release policy '{}'", other)),
        }
    }
}

/// Per-stream bookkeeping, reset on every start.
#[derive(Debug, Clone)]
pub struct StreamState {
    pub start_time: Instant,
    /// Completed press/release pairs so far
    pub note_index: u64,
    /// A key-down is waiting for its release
    pub key_is_pressed: bool,
}

impl StreamState {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            note_index: 0,
            key_is_pressed: false,
        }
    }

    fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}

impl Default for StreamState {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns note messages into key-down / key-released events.
pub struct NoteTracker {
    state: StreamState,
    policy: ReleasePolicy,
}

impl NoteTracker {
    pub fn new(policy: ReleasePolicy) -> Self {
        Self {
            state: StreamState::new(),
            policy,
        }
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    pub fn into_state(self) -> StreamState {
        self.state
    }

    /// Process one message from the device.
    ///
    /// Anything but note on / note off yields `Ok(None)`. Note on with zero
    /// velocity counts as a release.
    pub fn process(&mut self, msg: &MidiMessage) -> Result<Option<NoteEvent>, CaptureError> {
        match *msg {
            MidiMessage::NoteOn { note, velocity, .. } if velocity > 0 => {
                let event = self.event(note, EventKind::KeyDown, velocity);
                self.state.key_is_pressed = true;
                Ok(Some(event))
            }
            MidiMessage::NoteOn { note, velocity, .. }
            | MidiMessage::NoteOff { note, velocity, .. } => self.release(note, velocity),
            _ => {
                log::trace!("Ignoring non-note message {:?}", msg);
                Ok(None)
            }
        }
    }

    fn release(&mut self, note: u8, velocity: u8) -> Result<Option<NoteEvent>, CaptureError> {
        if !self.state.key_is_pressed {
            return match self.policy {
                ReleasePolicy::Drop => {
                    log::debug!("Dropping release of note {} with no pending press", note);
                    Ok(None)
                }
                ReleasePolicy::Error => Err(CaptureError::UnmatchedRelease { note }),
            };
        }

        let event = self.event(note, EventKind::KeyReleased, velocity);
        self.state.key_is_pressed = false;
        self.state.note_index += 1;
        Ok(Some(event))
    }

    fn event(&self, note: u8, kind: EventKind, velocity: u8) -> NoteEvent {
        NoteEvent {
            order: self.state.note_index,
            note,
            kind,
            velocity,
            timestamp: self.state.elapsed_secs(),
            global_time: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(tracker: &mut NoteTracker, messages: &[MidiMessage]) -> Vec<NoteEvent> {
        messages
            .iter()
            .filter_map(|msg| tracker.process(msg).unwrap())
            .collect()
    }

    #[test]
    fn test_press_release_pair() {
        let mut tracker = NoteTracker::new(ReleasePolicy::Drop);
        let events = run(
            &mut tracker,
            &[MidiMessage::note_on(60, 100), MidiMessage::note_on(60, 0)],
        );

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].order, 0);
        assert_eq!(events[0].note, 60);
        assert_eq!(events[0].kind, EventKind::KeyDown);
        assert_eq!(events[0].velocity, 100);
        assert_eq!(events[1].order, 0);
        assert_eq!(events[1].note, 60);
        assert_eq!(events[1].kind, EventKind::KeyReleased);
        assert_eq!(events[1].velocity, 0);
        assert_eq!(tracker.state().note_index, 1);
        assert!(!tracker.state().key_is_pressed);
    }

    #[test]
    fn test_order_increments_once_per_pair() {
        let mut tracker = NoteTracker::new(ReleasePolicy::Drop);
        let mut messages = Vec::new();
        for note in 60..65 {
            messages.push(MidiMessage::note_on(note, 90));
            // Alternate the two release idioms
            if note % 2 == 0 {
                messages.push(MidiMessage::note_on(note, 0));
            } else {
                messages.push(MidiMessage::note_off(note, 64));
            }
        }

        let events = run(&mut tracker, &messages);
        assert_eq!(events.len(), 10);
        for (pair, chunk) in events.chunks(2).enumerate() {
            assert_eq!(chunk[0].kind, EventKind::KeyDown);
            assert_eq!(chunk[1].kind, EventKind::KeyReleased);
            assert_eq!(chunk[0].order, pair as u64);
            assert_eq!(chunk[1].order, pair as u64);
        }
        assert_eq!(tracker.state().note_index, 5);
    }

    #[test]
    fn test_unmatched_release_dropped() {
        let mut tracker = NoteTracker::new(ReleasePolicy::Drop);
        let events = run(
            &mut tracker,
            &[MidiMessage::note_on(61, 0), MidiMessage::note_off(61, 0)],
        );
        assert!(events.is_empty());
        assert_eq!(tracker.state().note_index, 0);
    }

    #[test]
    fn test_unmatched_release_error_policy() {
        let mut tracker = NoteTracker::new(ReleasePolicy::Error);
        let result = tracker.process(&MidiMessage::note_on(61, 0));
        assert!(matches!(
            result,
            Err(CaptureError::UnmatchedRelease { note: 61 })
        ));
        assert_eq!(tracker.state().note_index, 0);

        // A matched release is still fine under the error policy
        assert!(tracker.process(&MidiMessage::note_on(62, 10)).unwrap().is_some());
        assert!(tracker.process(&MidiMessage::note_off(62, 0)).unwrap().is_some());
    }

    #[test]
    fn test_second_release_after_pair_is_dropped() {
        let mut tracker = NoteTracker::new(ReleasePolicy::Drop);
        let events = run(
            &mut tracker,
            &[
                MidiMessage::note_on(60, 100),
                MidiMessage::note_off(60, 0),
                MidiMessage::note_off(60, 0),
            ],
        );
        assert_eq!(events.len(), 2);
        assert_eq!(tracker.state().note_index, 1);
    }

    #[test]
    fn test_non_note_messages_ignored() {
        let mut tracker = NoteTracker::new(ReleasePolicy::Error);
        let events = run(
            &mut tracker,
            &[MidiMessage::control_change(64, 127), MidiMessage::Other],
        );
        assert!(events.is_empty());
        assert!(!tracker.state().key_is_pressed);
    }

    #[test]
    fn test_timestamps_non_decreasing() {
        let mut tracker = NoteTracker::new(ReleasePolicy::Drop);
        let mut messages = Vec::new();
        for _ in 0..50 {
            messages.push(MidiMessage::note_on(70, 80));
            messages.push(MidiMessage::note_on(70, 0));
        }
        let events = run(&mut tracker, &messages);

        let mut last = 0.0;
        for event in &events {
            assert!(event.timestamp >= 0.0);
            assert!(event.timestamp >= last);
            last = event.timestamp;
        }
    }

    #[test]
    fn test_release_policy_from_str() {
        assert_eq!("drop".parse::<ReleasePolicy>(), Ok(ReleasePolicy::Drop));
        assert_eq!("error".parse::<ReleasePolicy>(), Ok(ReleasePolicy::Error));
        assert!("panic".parse::<ReleasePolicy>().is_err());
    }
}
