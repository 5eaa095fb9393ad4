//! Core types for the Proctor Flux engine
//!
//! This module defines the data structures that flow through the engine:
//! per-frame detections coming in, verdicts and events going out, and the
//! session/report records built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ComputeError;

/// Default frame width (pixels) when a frame record does not state one
pub const DEFAULT_FRAME_WIDTH: f64 = 1280.0;

/// Default frame height (pixels) when a frame record does not state one
pub const DEFAULT_FRAME_HEIGHT: f64 = 720.0;

/// Semantically fixed indices into a face-mesh landmark set
pub mod landmark_index {
    pub const NOSE_TIP: usize = 1;
    pub const FOREHEAD: usize = 10;
    pub const LEFT_EYE: usize = 33;
    pub const CHIN: usize = 152;
    pub const RIGHT_EYE: usize = 263;
}

/// Normalized 2-D point relative to the frame, `(x, y)` in `[0, 1]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One detected face: an ordered landmark sequence with fixed index semantics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Face {
    pub landmarks: Vec<Landmark>,
}

impl Face {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }

    /// Landmark at a semantic index, if the detector produced it
    pub fn landmark(&self, index: usize) -> Option<&Landmark> {
        self.landmarks.get(index)
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }
}

/// Axis-aligned box; pixel or normalized units depending on the call site
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn area(&self) -> f64 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    /// Height over width; `None` for a degenerate box
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.w > 0.0 && self.h > 0.0 {
            Some(self.h / self.w)
        } else {
            None
        }
    }

    /// True when both dimensions are strictly positive
    pub fn has_extent(&self) -> bool {
        self.w > 0.0 && self.h > 0.0
    }

    /// Scale a normalized box into pixel space
    pub fn scaled(&self, width: f64, height: f64) -> Self {
        Self {
            x: self.x * width,
            y: self.y * height,
            w: self.w * width,
            h: self.h * height,
        }
    }
}

/// Object-detection backend that produced a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// ml5 YOLO / COCO-SSD style predictions
    CocoSsd,
    /// MediaPipe EfficientDet object detector
    #[serde(rename = "mediapipe")]
    MediaPipe,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::CocoSsd => "coco_ssd",
            ProviderKind::MediaPipe => "mediapipe",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coco_ssd" | "cocossd" | "coco-ssd" | "ml5" | "yolo" => Ok(ProviderKind::CocoSsd),
            "mediapipe" | "mp" | "efficientdet" => Ok(ProviderKind::MediaPipe),
            other => Err(ComputeError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// One object-detector output after provider normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Raw detector label
    pub label: String,
    /// Confidence (0-1)
    pub score: f64,
    /// Box in pixel units, when the provider reported one
    #[serde(rename = "box", default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
    /// Provider that produced the detection
    pub source: ProviderKind,
    /// Derived by a heuristic rather than reported by a detector
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub synthetic: bool,
}

impl Detection {
    pub fn new(label: impl Into<String>, score: f64, bbox: Option<BoundingBox>, source: ProviderKind) -> Self {
        Self {
            label: label.into(),
            score,
            bbox,
            source,
            synthetic: false,
        }
    }
}

/// A provider that could not produce detections for a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider: ProviderKind,
    pub reason: String,
}

/// Everything the perception layer produced for one video frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionFrame {
    /// Capture time of the frame
    pub timestamp: DateTime<Utc>,
    /// Frame width in pixels
    #[serde(default = "default_frame_width")]
    pub frame_width: f64,
    /// Frame height in pixels
    #[serde(default = "default_frame_height")]
    pub frame_height: f64,
    /// Face landmark sets (possibly empty)
    #[serde(default)]
    pub faces: Vec<Face>,
    /// Object detections; `None` when the object detectors did not run on this frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<Detection>>,
    /// Providers that failed while producing `objects`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provider_failures: Vec<ProviderFailure>,
}

fn default_frame_width() -> f64 {
    DEFAULT_FRAME_WIDTH
}

fn default_frame_height() -> f64 {
    DEFAULT_FRAME_HEIGHT
}

impl DetectionFrame {
    /// Face-only frame with default frame dimensions
    pub fn faces(timestamp: DateTime<Utc>, faces: Vec<Face>) -> Self {
        Self {
            timestamp,
            frame_width: DEFAULT_FRAME_WIDTH,
            frame_height: DEFAULT_FRAME_HEIGHT,
            faces,
            objects: None,
            provider_failures: Vec::new(),
        }
    }

    /// Attach a polled set of object detections
    pub fn with_objects(mut self, objects: Vec<Detection>) -> Self {
        self.objects = Some(objects);
        self
    }

    /// Override the frame dimensions
    pub fn with_dimensions(mut self, width: f64, height: f64) -> Self {
        self.frame_width = width;
        self.frame_height = height;
        self
    }

    pub fn frame_area(&self) -> f64 {
        self.frame_width.max(0.0) * self.frame_height.max(0.0)
    }
}

/// Per-frame attention verdict for the most relevant face
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AttentionVerdict {
    pub attentive: bool,
    pub yaw_deg: f64,
    pub pitch_deg: f64,
    pub bbox_area: f64,
    pub center_offset: f64,
    pub face_count: usize,
}

/// Closed set of integrity event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    NoFace,
    Inattention,
    MultipleFaces,
    Phone,
    Book,
    Watch,
    Paper,
    Noise,
    Info,
    Error,
}

impl EventType {
    /// Event types produced by the object pipeline, in evaluation order
    pub const OBJECTS: [EventType; 4] = [
        EventType::Phone,
        EventType::Book,
        EventType::Watch,
        EventType::Paper,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::NoFace => "NO_FACE",
            EventType::Inattention => "INATTENTION",
            EventType::MultipleFaces => "MULTIPLE_FACES",
            EventType::Phone => "PHONE",
            EventType::Book => "BOOK",
            EventType::Watch => "WATCH",
            EventType::Paper => "PAPER",
            EventType::Noise => "NOISE",
            EventType::Info => "INFO",
            EventType::Error => "ERROR",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A committed integrity event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub detail: String,
}

impl Event {
    pub fn new(timestamp: DateTime<Utc>, event_type: EventType, detail: impl Into<String>) -> Self {
        Self {
            timestamp,
            event_type,
            detail: detail.into(),
        }
    }
}

/// Assessment session metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub candidate_name: String,
    pub start_ts: DateTime<Utc>,
    pub end_ts: Option<DateTime<Utc>>,
}

impl Session {
    /// Open a session with a fresh random identifier
    pub fn new(candidate_name: impl Into<String>, start_ts: DateTime<Utc>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), candidate_name, start_ts)
    }

    pub fn with_id(id: impl Into<String>, candidate_name: impl Into<String>, start_ts: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            candidate_name: candidate_name.into(),
            start_ts,
            end_ts: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.end_ts.is_some()
    }
}

/// Integrity report for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub session_id: String,
    pub candidate_name: String,
    pub start_ts: DateTime<Utc>,
    pub end_ts: Option<DateTime<Utc>>,
    /// Counts for event types that occurred at least once
    pub event_counts: BTreeMap<EventType, u32>,
    /// Score in `[0, 100]`
    pub integrity_score: f64,
    pub interview_duration_sec: u64,
}
