use std::fmt;

use crate::event::NoteEvent;

/// Columnar view of captured events for printing.
///
/// The `global_time` column only appears when at least one event carries it.
pub struct EventTable<'a>(pub &'a [NoteEvent]);

impl fmt::Display for EventTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let with_global = self.0.iter().any(|e| e.global_time.is_some());

        write!(
            f,
            "{:>6} {:>5} {:>5} {:<13} {:>8} {:>10}",
            "", "order", "note", "type", "velocity", "timestamp"
        )?;
        if with_global {
            write!(f, " {:>11}", "global_time")?;
        }
        writeln!(f)?;

        for (row, event) in self.0.iter().enumerate() {
            write!(
                f,
                "{:>6} {:>5} {:>5} {:<13} {:>8} {:>10.4}",
                row,
                event.order,
                event.note,
                event.kind.as_str(),
                event.velocity,
                event.timestamp
            )?;
            if with_global {
                match event.global_time {
                    Some(t) => write!(f, " {:>11.4}", t)?,
                    None => write!(f, " {:>11}", "NaN")?,
                }
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    fn event(kind: EventKind, global_time: Option<f64>) -> NoteEvent {
        NoteEvent {
            order: 3,
            note: 60,
            kind,
            velocity: 100,
            timestamp: 1.5,
            global_time,
        }
    }

    #[test]
    fn test_table_without_global_time() {
        let events = vec![event(EventKind::KeyDown, None)];
        let rendered = EventTable(&events).to_string();

        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(!lines[0].contains("global_time"));
        assert!(lines[1].contains("key_down"));
        assert!(lines[1].contains("1.5000"));
    }

    #[test]
    fn test_table_with_global_time() {
        let events = vec![
            event(EventKind::KeyDown, Some(42.0)),
            event(EventKind::KeyReleased, None),
        ];
        let rendered = EventTable(&events).to_string();

        let lines: Vec<&str> = rendered.lines().collect();
        assert!(lines[0].ends_with("global_time"));
        assert!(lines[1].ends_with("42.0000"));
        assert!(lines[2].contains("key_released"));
        assert!(lines[2].ends_with("NaN"));
    }

    #[test]
    fn test_empty_table_has_header_only() {
        assert_eq!(EventTable(&[]).to_string().lines().count(), 1);
    }
}
