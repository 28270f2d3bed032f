use thiserror::Error;

/// Errors raised by the capture pipeline.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("MIDI device '{0}' not found")]
    DeviceNotFound(String),

    #[error("MIDI driver error: {0}")]
    Driver(String),

    #[error("streaming has not been started")]
    StreamNotStarted,

    #[error("streaming is already running")]
    AlreadyStreaming,

    #[error("release of note {note} arrived with no pending key press")]
    UnmatchedRelease { note: u8 },

    #[error("subscriber is not registered")]
    SubscriberNotFound,

    #[error("poller thread panicked")]
    PollerPanicked,

    #[error("MIDI device is no longer held by the poller")]
    DeviceUnavailable,
}

/// Failure reported by a subscriber callback.
#[derive(Debug, Clone, Error)]
#[error("subscriber failed: {0}")]
pub struct SubscriberError(pub String);

impl SubscriberError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}
