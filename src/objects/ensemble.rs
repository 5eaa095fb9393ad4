//! Ensemble aggregation across object-detection providers
//!
//! Detections from every provider are merged per canonical label, keeping the
//! single highest-scoring detection (max-score wins, scores are not averaged).
//! Books with sheet-like proportions also yield a discounted paper candidate.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::ObjectConfig;
use crate::objects::labels::{canonical_label, BOOK_LABEL, PAPER_LABEL};
use crate::types::{Detection, Event, EventType, ProviderFailure, ProviderKind};

/// Merge provider outputs, keyed by canonical label.
///
/// Empty labels and non-finite scores are dropped; on equal scores the first
/// detection is kept.
pub fn aggregate<'a, I>(detections: I, config: &ObjectConfig) -> BTreeMap<String, Detection>
where
    I: IntoIterator<Item = &'a Detection>,
{
    let mut merged: BTreeMap<String, Detection> = BTreeMap::new();

    for detection in detections {
        let key = canonical_label(&detection.label);
        if key.is_empty() {
            continue;
        }
        if !detection.score.is_finite() {
            debug!(label = %detection.label, "non-finite score dropped");
            continue;
        }
        keep_stronger(&mut merged, key, detection.clone());
    }

    if let Some(paper) = merged.get(BOOK_LABEL).and_then(|book| derive_paper_from_book(book, config)) {
        keep_stronger(&mut merged, PAPER_LABEL.to_string(), paper);
    }

    merged
}

fn keep_stronger(merged: &mut BTreeMap<String, Detection>, key: String, candidate: Detection) {
    match merged.get(&key) {
        Some(existing) if existing.score >= candidate.score => {}
        _ => {
            merged.insert(key, candidate);
        }
    }
}

/// Paper candidate from a book whose height/width ratio falls outside the
/// book range; books are squarer than sheets.
pub fn derive_paper_from_book(book: &Detection, config: &ObjectConfig) -> Option<Detection> {
    let bbox = book.bbox?;
    let aspect = bbox.aspect_ratio()?;
    if aspect >= config.paper_min_aspect && aspect <= config.paper_max_aspect {
        return None;
    }

    Some(Detection {
        label: PAPER_LABEL.to_string(),
        score: book.score * config.paper_score_factor,
        bbox: Some(bbox),
        source: book.source,
        synthetic: true,
    })
}

/// Tracks which providers are currently failing.
///
/// The first failure of a provider produces one `ERROR` event. The provider
/// stays degraded until it contributes detections again without failing,
/// which produces one `INFO` recovery event.
#[derive(Debug, Clone, Default)]
pub struct ProviderHealth {
    degraded: BTreeSet<ProviderKind>,
}

impl ProviderHealth {
    pub fn is_degraded(&self, provider: ProviderKind) -> bool {
        self.degraded.contains(&provider)
    }

    /// Record one poll: the providers that failed and the detections that
    /// were delivered
    pub fn observe(
        &mut self,
        failures: &[ProviderFailure],
        detections: &[Detection],
        now: DateTime<Utc>,
    ) -> Vec<Event> {
        let mut events = Vec::new();

        let failing: BTreeSet<ProviderKind> = failures.iter().map(|f| f.provider).collect();
        let contributing: BTreeSet<ProviderKind> = detections.iter().map(|d| d.source).collect();
        let recovered: Vec<ProviderKind> = self
            .degraded
            .iter()
            .filter(|p| contributing.contains(*p) && !failing.contains(*p))
            .copied()
            .collect();
        for provider in recovered {
            self.degraded.remove(&provider);
            events.push(Event::new(
                now,
                EventType::Info,
                format!("{provider} detector recovered"),
            ));
        }

        for failure in failures {
            if self.degraded.insert(failure.provider) {
                warn!(provider = %failure.provider, reason = %failure.reason, "detection provider unavailable");
                events.push(Event::new(
                    now,
                    EventType::Error,
                    format!("{} detector unavailable: {}", failure.provider, failure.reason),
                ));
            }
        }

        events
    }

    pub fn reset(&mut self) {
        self.degraded.clear();
    }
}
