//! Proctor Flux - signal-to-event engine for remote assessment proctoring
//!
//! Flux turns noisy per-frame perception output (face landmarks, object
//! detections, audio loudness) into a small set of debounced integrity events
//! and a single integrity score: provider adaptation → attention and presence
//! classification → object ensemble gating → event log → report.
//!
//! ## Modules
//!
//! - **Face path**: attention verdicts, no-face / inattention debouncing and
//!   multiple-face confirmation ([`faces`])
//! - **Object path**: ensemble aggregation, geometric gating, smoothing and
//!   cooldown for phone, book, watch and paper ([`objects`])
//! - **Noise**: sustained-loudness detection ([`noise`])
//! - **Session**: per-assessment state, event log and reports ([`session`])
//! - **Replay**: drive a session from a recorded detection stream ([`replay`])

pub mod adapters;
pub mod attention;
pub mod config;
pub mod debounce;
pub mod error;
pub mod events;
pub mod faces;
pub mod geometry;
pub mod multiface;
pub mod noise;
pub mod objects;
pub mod outbox;
pub mod replay;
pub mod report;
pub mod session;
pub mod types;

pub use adapters::{CocoSsdAdapter, DetectionAdapter, MediaPipeAdapter};
pub use config::{DeductionTable, ThresholdConfig};
pub use error::ComputeError;
pub use events::EventLog;
pub use outbox::{EventBatch, EventOutbox, EventSink};
pub use report::{compute_report, integrity_score};
pub use session::{FrameOutcome, ProctorSession};
pub use types::{
    BoundingBox, Detection, DetectionFrame, Event, EventType, Face, Landmark, ProviderKind,
    Report, Session,
};

/// Flux version reported by the CLI and embedded in exports
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for exported reports
pub const PRODUCER_NAME: &str = "proctor-flux";
