//! Integrity scoring and session reports

use std::collections::BTreeMap;

use crate::config::DeductionTable;
use crate::types::{Event, EventType, Report, Session};

/// Maximum (and starting) integrity score
pub const MAX_SCORE: f64 = 100.0;

/// Occurrences per event type
pub fn count_events(events: &[Event]) -> BTreeMap<EventType, u32> {
    let mut counts = BTreeMap::new();
    for event in events {
        *counts.entry(event.event_type).or_insert(0) += 1;
    }
    counts
}

/// `100 - Σ count × penalty`, clamped to `[0, 100]`
pub fn integrity_score(events: &[Event], deductions: &DeductionTable) -> f64 {
    let penalty: f64 = count_events(events)
        .into_iter()
        .map(|(event_type, count)| f64::from(count) * deductions.penalty(event_type))
        .sum();
    (MAX_SCORE - penalty).clamp(0.0, MAX_SCORE)
}

/// Build the report for a session and its events
pub fn compute_report(session: &Session, events: &[Event], deductions: &DeductionTable) -> Report {
    let interview_duration_sec = session
        .end_ts
        .map(|end| {
            let ms = (end - session.start_ts).num_milliseconds().max(0);
            (ms as f64 / 1000.0).round() as u64
        })
        .unwrap_or(0);

    Report {
        session_id: session.id.clone(),
        candidate_name: session.candidate_name.clone(),
        start_ts: session.start_ts,
        end_ts: session.end_ts,
        event_counts: count_events(events),
        integrity_score: integrity_score(events, deductions),
        interview_duration_sec,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn events_of(types: &[EventType]) -> Vec<Event> {
        types.iter().map(|t| Event::new(t0(), *t, "")).collect()
    }

    #[test]
    fn test_score_with_default_table() {
        let events = events_of(&[
            EventType::Phone,
            EventType::Inattention,
            EventType::Inattention,
            EventType::Info,
            EventType::Error,
        ]);
        assert_eq!(integrity_score(&events, &DeductionTable::default()), 66.0);
    }

    #[test]
    fn test_score_clamps_at_zero() {
        let events = events_of(&[EventType::Phone; 1000]);
        assert_eq!(integrity_score(&events, &DeductionTable::default()), 0.0);
    }

    #[test]
    fn test_empty_log_scores_full() {
        assert_eq!(integrity_score(&[], &DeductionTable::default()), MAX_SCORE);
        let events = events_of(&[EventType::Phone]);
        assert_eq!(integrity_score(&events, &DeductionTable::empty()), MAX_SCORE);
    }

    #[test]
    fn test_non_finite_penalty_keeps_score_in_range() {
        let table = DeductionTable::from_pairs([
            (EventType::Phone, f64::NAN),
            (EventType::Book, f64::INFINITY),
            (EventType::Watch, 10.0),
        ]);
        let events = events_of(&[EventType::Phone, EventType::Book, EventType::Watch]);
        assert_eq!(integrity_score(&events, &table), 90.0);
    }

    #[test]
    fn test_report_fields() {
        let mut session = Session::with_id("s-42", "Ada", t0());
        session.end_ts = Some(t0() + Duration::milliseconds(90_600));
        let events = events_of(&[EventType::Book, EventType::Book, EventType::Noise]);

        let report = compute_report(&session, &events, &DeductionTable::default());
        assert_eq!(report.session_id, "s-42");
        assert_eq!(report.interview_duration_sec, 91);
        assert_eq!(report.integrity_score, 65.0);
        assert_eq!(
            report.event_counts,
            BTreeMap::from([(EventType::Book, 2), (EventType::Noise, 1)])
        );
    }

    #[test]
    fn test_report_json_keys() {
        let mut session = Session::with_id("s-1", "Ada", t0());
        session.end_ts = Some(t0() + Duration::seconds(60));
        let report = compute_report(&session, &events_of(&[EventType::Phone]), &DeductionTable::default());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["sessionId"], "s-1");
        assert_eq!(json["candidateName"], "Ada");
        assert_eq!(json["eventCounts"]["PHONE"], 1);
        assert_eq!(json["integrityScore"], 70.0);
        assert_eq!(json["interviewDurationSec"], 60);
    }

    proptest! {
        #[test]
        fn test_score_always_in_range(
            kinds in proptest::collection::vec(0usize..10, 0..400),
            penalty in 0.0f64..50.0,
        ) {
            let all = [
                EventType::NoFace, EventType::Inattention, EventType::MultipleFaces,
                EventType::Phone, EventType::Book, EventType::Watch, EventType::Paper,
                EventType::Noise, EventType::Info, EventType::Error,
            ];
            let events: Vec<Event> = kinds.iter().map(|k| Event::new(t0(), all[*k], "")).collect();
            let table = DeductionTable::from_pairs(all.iter().map(|t| (*t, penalty)));
            let score = integrity_score(&events, &table);
            prop_assert!((0.0..=MAX_SCORE).contains(&score));
        }
    }
}
