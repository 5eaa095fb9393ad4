//! Session event log
//!
//! Append-only ordered record of committed events. Once frozen at session
//! stop, appends and clears are rejected.

use chrono::SecondsFormat;

use crate::error::ComputeError;
use crate::types::Event;

/// CSV header line
pub const CSV_HEADER: &str = "timestamp,type,detail";

/// Ordered event log owned by a session
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    session_id: String,
    events: Vec<Event>,
    frozen: bool,
}

impl EventLog {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            events: Vec::new(),
            frozen: false,
        }
    }

    pub fn append(&mut self, event: Event) -> Result<(), ComputeError> {
        if self.frozen {
            return Err(ComputeError::SessionClosed(self.session_id.clone()));
        }
        self.events.push(event);
        Ok(())
    }

    pub fn extend<I: IntoIterator<Item = Event>>(&mut self, events: I) -> Result<(), ComputeError> {
        for event in events {
            self.append(event)?;
        }
        Ok(())
    }

    pub fn all(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) -> Result<(), ComputeError> {
        if self.frozen {
            return Err(ComputeError::SessionClosed(self.session_id.clone()));
        }
        self.events.clear();
        Ok(())
    }

    /// Reject every later mutation
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// `timestamp,type,detail` rows; the detail is always quoted with
    /// embedded quotes doubled
    pub fn to_csv(&self) -> String {
        let mut out = String::from(CSV_HEADER);
        for event in &self.events {
            out.push('\n');
            out.push_str(&csv_row(event));
        }
        out
    }
}

fn csv_row(event: &Event) -> String {
    format!(
        "{},{},\"{}\"",
        event.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        event.event_type,
        event.detail.replace('"', "\"\"")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventType;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn event(event_type: EventType, detail: &str) -> Event {
        Event::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(), event_type, detail)
    }

    #[test]
    fn test_append_preserves_order() {
        let mut log = EventLog::new("s1");
        log.append(event(EventType::NoFace, "a")).unwrap();
        log.append(event(EventType::Phone, "b")).unwrap();
        let types: Vec<EventType> = log.all().iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![EventType::NoFace, EventType::Phone]);
    }

    #[test]
    fn test_csv_export_escapes_quotes() {
        let mut log = EventLog::new("s1");
        log.append(event(EventType::Info, r#"said "hi", then left"#)).unwrap();
        assert_eq!(
            log.to_csv(),
            "timestamp,type,detail\n2024-05-01T09:00:00.000Z,INFO,\"said \"\"hi\"\", then left\""
        );
    }

    #[test]
    fn test_empty_csv_is_header_only() {
        assert_eq!(EventLog::new("s1").to_csv(), CSV_HEADER);
    }

    #[test]
    fn test_frozen_log_rejects_mutation() {
        let mut log = EventLog::new("s1");
        log.append(event(EventType::Noise, "x")).unwrap();
        log.freeze();
        assert!(matches!(
            log.append(event(EventType::Noise, "y")),
            Err(ComputeError::SessionClosed(id)) if id == "s1"
        ));
        assert!(log.clear().is_err());
        assert_eq!(log.len(), 1);
    }
}
