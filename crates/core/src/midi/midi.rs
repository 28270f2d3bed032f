use midly::live::LiveEvent;

// MIDI message types as handed over by the device driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    Other,
}

impl MidiMessage {
    pub fn note_on(note: u8, velocity: u8) -> Self {
        Self::NoteOn {
            channel: 0,
            note,
            velocity,
        }
    }

    pub fn note_off(note: u8, velocity: u8) -> Self {
        Self::NoteOff {
            channel: 0,
            note,
            velocity,
        }
    }

    pub fn control_change(controller: u8, value: u8) -> Self {
        Self::ControlChange {
            channel: 0,
            controller,
            value,
        }
    }

    /// Decode one raw message from the wire.
    ///
    /// Returns `None` when midly cannot parse the bytes. Channel messages we
    /// don't track and all system messages decode to `Other`.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let event = LiveEvent::parse(bytes).ok()?;

        let message = match event {
            LiveEvent::Midi { channel, message } => {
                let channel = channel.as_int();
                match message {
                    midly::MidiMessage::NoteOn { key, vel } => Self::NoteOn {
                        channel,
                        note: key.as_int(),
                        velocity: vel.as_int(),
                    },
                    midly::MidiMessage::NoteOff { key, vel } => Self::NoteOff {
                        channel,
                        note: key.as_int(),
                        velocity: vel.as_int(),
                    },
                    midly::MidiMessage::Controller { controller, value } => Self::ControlChange {
                        channel,
                        controller: controller.as_int(),
                        value: value.as_int(),
                    },
                    _ => Self::Other,
                }
            }
            _ => Self::Other,
        };

        Some(message)
    }

    /// Only note on and note off reach the tracker.
    pub fn is_note(&self) -> bool {
        matches!(self, Self::NoteOn { .. } | Self::NoteOff { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_note_on() {
        let msg = MidiMessage::decode(&[0x90, 60, 100]);
        assert_eq!(
            msg,
            Some(MidiMessage::NoteOn {
                channel: 0,
                note: 60,
                velocity: 100
            })
        );
    }

    #[test]
    fn test_decode_keeps_zero_velocity_note_on() {
        // Zero velocity note on is left for the tracker to interpret
        let msg = MidiMessage::decode(&[0x93, 61, 0]);
        assert_eq!(
            msg,
            Some(MidiMessage::NoteOn {
                channel: 3,
                note: 61,
                velocity: 0
            })
        );
    }

    #[test]
    fn test_decode_note_off_and_cc() {
        assert_eq!(
            MidiMessage::decode(&[0x80, 62, 40]),
            Some(MidiMessage::note_off(62, 40))
        );
        assert_eq!(
            MidiMessage::decode(&[0xB0, 64, 127]),
            Some(MidiMessage::control_change(64, 127))
        );
    }

    #[test]
    fn test_decode_other_and_garbage() {
        // Timing clock
        assert_eq!(MidiMessage::decode(&[0xF8]), Some(MidiMessage::Other));
        // Program change
        assert_eq!(MidiMessage::decode(&[0xC0, 5]), Some(MidiMessage::Other));
        assert_eq!(MidiMessage::decode(&[]), None);
    }

    #[test]
    fn test_is_note() {
        assert!(MidiMessage::note_on(60, 1).is_note());
        assert!(MidiMessage::note_off(60, 0).is_note());
        assert!(!MidiMessage::control_change(1, 2).is_note());
        assert!(!MidiMessage::Other.is_note());
    }
}
