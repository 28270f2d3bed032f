use serde::{Deserialize, Serialize};

/// Which half of a key stroke an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    KeyDown,
    KeyReleased,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::KeyDown => "key_down",
            EventKind::KeyReleased => "key_released",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One captured key event.
///
/// A press and its matching release share the same `order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub order: u64,
    pub note: u8,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub velocity: u8,
    /// Seconds since streaming started
    pub timestamp: f64,
    /// Reading of the experiment clock, when one is registered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_time: Option<f64>,
}
