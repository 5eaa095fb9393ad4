//! Detector label normalization
//!
//! Raw labels differ between models ("cell phone", "Mobile  Phone",
//! "smartphone"). Labels are lower-cased, trimmed and whitespace-collapsed,
//! mapped through an alias table to a canonical label, then to an event type.

use crate::types::EventType;

/// Alias → canonical label
const LABEL_ALIASES: &[(&str, &str)] = &[
    ("cell phone", "cell phone"),
    ("mobile phone", "cell phone"),
    ("smartphone", "cell phone"),
    ("smart phone", "cell phone"),
    ("phone", "cell phone"),
    ("cellphone", "cell phone"),
    ("telephone", "cell phone"),
    ("iphone", "cell phone"),
    ("android phone", "cell phone"),
    ("mobile", "cell phone"),
    ("cellular phone", "cell phone"),
    ("telephone handset", "cell phone"),
    ("handphone", "cell phone"),
    ("feature phone", "cell phone"),
];

/// Canonical label → event type. "clock" stands in for a wrist watch,
/// "paper" is also produced synthetically from elongated books.
const TARGET_LABELS: &[(&str, EventType)] = &[
    ("cell phone", EventType::Phone),
    ("mobile phone", EventType::Phone),
    ("smartphone", EventType::Phone),
    ("phone", EventType::Phone),
    ("book", EventType::Book),
    ("paper", EventType::Paper),
    ("clock", EventType::Watch),
];

/// Canonical label used for the synthetic paper candidate
pub const PAPER_LABEL: &str = "paper";

/// Canonical label that may yield a paper candidate
pub const BOOK_LABEL: &str = "book";

/// Trim, lower-case and collapse internal whitespace
pub fn normalize_label(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalized label after alias resolution
pub fn canonical_label(raw: &str) -> String {
    let normalized = normalize_label(raw);
    lookup(LABEL_ALIASES, &normalized)
        .map(|canon| canon.to_string())
        .unwrap_or(normalized)
}

/// Event type for a raw label, if it is one the engine tracks
pub fn event_for_label(raw: &str) -> Option<EventType> {
    let normalized = normalize_label(raw);
    let canonical = lookup(LABEL_ALIASES, &normalized).unwrap_or(normalized.as_str());
    lookup(TARGET_LABELS, canonical).or_else(|| lookup(TARGET_LABELS, &normalized))
}

fn lookup<T: Copy>(table: &[(&str, T)], key: &str) -> Option<T> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}
