//! Delivery outbox
//!
//! Buffers committed events for an external store. Delivery is best-effort
//! and at-least-once: a failed batch goes back to the front of the queue.
//! Classification never waits on the outbox; the driver decides when to flush.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ComputeError;
use crate::types::{Event, EventType};

/// Bulk payload handed to a sink
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBatch {
    pub session_id: String,
    pub candidate_name: String,
    pub events: Vec<Event>,
}

/// Destination for event batches (HTTP API, file, queue)
pub trait EventSink {
    /// Deliver one batch; an error leaves the batch queued
    fn send(&mut self, batch: &EventBatch) -> Result<(), ComputeError>;
}

/// Outcome of one flush attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Empty,
    Delivered(usize),
    Requeued(usize),
}

/// Pending-event buffer for one session
#[derive(Debug, Clone)]
pub struct EventOutbox {
    session_id: String,
    candidate_name: String,
    pending: VecDeque<Event>,
    urgent: bool,
}

impl EventOutbox {
    pub fn new(session_id: impl Into<String>, candidate_name: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            candidate_name: candidate_name.into(),
            pending: VecDeque::new(),
            urgent: false,
        }
    }

    /// Queue an event; presence events mark the outbox urgent
    pub fn push(&mut self, event: Event) {
        if is_urgent(event.event_type) {
            self.urgent = true;
        }
        self.pending.push_back(event);
    }

    /// True once an event that should be delivered right away is queued
    pub fn needs_flush(&self) -> bool {
        self.urgent && !self.pending.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Send everything pending as one batch
    pub fn flush<S: EventSink + ?Sized>(&mut self, sink: &mut S) -> FlushOutcome {
        if self.pending.is_empty() {
            self.urgent = false;
            return FlushOutcome::Empty;
        }

        let batch = EventBatch {
            session_id: self.session_id.clone(),
            candidate_name: self.candidate_name.clone(),
            events: self.pending.drain(..).collect(),
        };
        let count = batch.events.len();

        match sink.send(&batch) {
            Ok(()) => {
                debug!(count, "event batch delivered");
                self.urgent = false;
                FlushOutcome::Delivered(count)
            }
            Err(error) => {
                warn!(count, %error, "event delivery failed, batch requeued");
                // events pushed during the attempt stay behind the failed batch
                for event in batch.events.into_iter().rev() {
                    self.pending.push_front(event);
                }
                FlushOutcome::Requeued(count)
            }
        }
    }
}

fn is_urgent(event_type: EventType) -> bool {
    matches!(event_type, EventType::Inattention | EventType::NoFace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[derive(Default)]
    struct RecordingSink {
        fail: bool,
        batches: Vec<EventBatch>,
    }

    impl EventSink for RecordingSink {
        fn send(&mut self, batch: &EventBatch) -> Result<(), ComputeError> {
            if self.fail {
                return Err(ComputeError::Delivery("connection refused".to_string()));
            }
            self.batches.push(batch.clone());
            Ok(())
        }
    }

    fn event(event_type: EventType, detail: &str) -> Event {
        Event::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(), event_type, detail)
    }

    #[test]
    fn test_presence_events_are_urgent() {
        let mut outbox = EventOutbox::new("s1", "Ada");
        outbox.push(event(EventType::Phone, "phone detected"));
        assert!(!outbox.needs_flush());
        outbox.push(event(EventType::NoFace, "No face for 10.1s"));
        assert!(outbox.needs_flush());
    }

    #[test]
    fn test_flush_delivers_batch() {
        let mut outbox = EventOutbox::new("s1", "Ada");
        let mut sink = RecordingSink::default();
        outbox.push(event(EventType::Noise, "n"));
        outbox.push(event(EventType::Inattention, "i"));

        assert_eq!(outbox.flush(&mut sink), FlushOutcome::Delivered(2));
        assert_eq!(outbox.pending(), 0);
        assert!(!outbox.needs_flush());
        assert_eq!(sink.batches[0].session_id, "s1");
        assert_eq!(sink.batches[0].events.len(), 2);
        assert_eq!(outbox.flush(&mut sink), FlushOutcome::Empty);
    }

    #[test]
    fn test_failed_flush_requeues_in_order() {
        let mut outbox = EventOutbox::new("s1", "Ada");
        let mut sink = RecordingSink {
            fail: true,
            ..RecordingSink::default()
        };
        outbox.push(event(EventType::Book, "first"));
        outbox.push(event(EventType::Watch, "second"));

        assert_eq!(outbox.flush(&mut sink), FlushOutcome::Requeued(2));
        assert_eq!(outbox.pending(), 2);

        sink.fail = false;
        outbox.push(event(EventType::Paper, "third"));
        outbox.flush(&mut sink);
        let details: Vec<&str> = sink.batches[0].events.iter().map(|e| e.detail.as_str()).collect();
        assert_eq!(details, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_batch_json_shape() {
        let batch = EventBatch {
            session_id: "s1".into(),
            candidate_name: "Ada".into(),
            events: vec![event(EventType::Phone, "phone detected")],
        };
        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["events"][0]["type"], "PHONE");
    }
}
