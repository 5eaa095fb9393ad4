//! Object event pipeline
//!
//! Polled at a reduced rate relative to face frames. Each poll goes through
//! four filters before a class may produce an event:
//!
//! 1. Ensemble aggregation and label normalization ([`ensemble`], [`labels`])
//! 2. Per-class geometric gating, including phone spatial stability
//! 3. Sliding-window score smoothing ([`tracking::ScoreWindow`])
//! 4. Consecutive-presence confirmation plus per-class cooldown
//!    ([`tracking::ClassGate`])

pub mod ensemble;
pub mod labels;
pub mod pipeline;
pub mod tracking;

pub use ensemble::{aggregate, derive_paper_from_book, ProviderHealth};
pub use labels::{canonical_label, event_for_label, normalize_label};
pub use pipeline::{ObjectPipeline, ObjectPollOutcome};
pub use tracking::{ClassGate, PhoneStability, ScoreWindow};
