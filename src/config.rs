//! Threshold configuration
//!
//! Every classifier reads its limits from [`ThresholdConfig`]. A config is
//! fixed for the lifetime of a session; overrides are applied before start
//! and validated by [`ThresholdConfig::validate`].
//!
//! The deduction table used by the scorer lives in [`DeductionTable`] and is
//! passed to the report builder separately.

use crate::error::ComputeError;
use crate::types::EventType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Head-pose and framing limits for the attention classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttentionConfig {
    /// Maximum absolute yaw (degrees) still considered attentive
    pub max_yaw_deg: f64,
    /// Maximum absolute pitch (degrees) still considered attentive
    pub max_pitch_deg: f64,
    /// Minimum face box area (fraction of frame); smaller faces are too distant
    pub min_box_area_ratio: f64,
    /// Maximum horizontal nose drift from screen center (normalized units)
    pub max_center_offset: f64,
}

impl Default for AttentionConfig {
    fn default() -> Self {
        Self {
            max_yaw_deg: 20.0,
            max_pitch_deg: 15.0,
            min_box_area_ratio: 0.02,
            max_center_offset: 0.18,
        }
    }
}

/// Sustained-duration thresholds for the no-face and inattention timers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    pub no_face_threshold_s: f64,
    pub inattention_threshold_s: f64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            no_face_threshold_s: 10.0,
            inattention_threshold_s: 5.0,
        }
    }
}

/// Streak confirmation for simultaneous faces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiFaceConfig {
    pub confirm_frames: u32,
    /// Second-largest face must cover at least this fraction of the frame
    pub min_second_face_area_ratio: f64,
}

impl Default for MultiFaceConfig {
    fn default() -> Self {
        Self {
            confirm_frames: 3,
            min_second_face_area_ratio: 0.015,
        }
    }
}

/// Object pipeline gating, smoothing and throttling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectConfig {
    /// Run object detection on every Nth face frame
    pub every_n_frames: u32,
    /// Smoothed-score threshold for BOOK, WATCH and PAPER
    pub object_conf_threshold: f64,
    /// Smoothed-score threshold for PHONE
    pub phone_conf_threshold: f64,
    /// Instantaneous scores below `threshold * factor` are dropped before smoothing
    pub confidence_floor_factor: f64,
    /// Consecutive polls a class must be present before it may fire
    pub confirm_frames: u32,
    /// Minimum spacing between two emissions of the same class
    pub cooldown_s: f64,
    /// Number of recent scores averaged per class
    pub smoothing_window: usize,
    /// Consecutive spatially stable polls required before PHONE may fire
    pub min_phone_frames: u32,
    pub phone_min_aspect: f64,
    pub phone_max_aspect: f64,
    pub phone_min_area_ratio: f64,
    pub phone_max_area_ratio: f64,
    /// IoU against the previous phone box needed to extend the stability run
    pub phone_iou_min: f64,
    /// Larger "watch" boxes are treated as misclassified faces
    pub watch_max_area_ratio: f64,
    /// Watch boxes overlapping a face at or above this IoU are dropped
    pub watch_face_iou_discard: f64,
    /// Books whose aspect ratio lies inside this range stay books
    pub paper_min_aspect: f64,
    pub paper_max_aspect: f64,
    /// Score discount applied to a paper candidate derived from a book
    pub paper_score_factor: f64,
}

impl Default for ObjectConfig {
    fn default() -> Self {
        Self {
            every_n_frames: 3,
            object_conf_threshold: 0.4,
            phone_conf_threshold: 0.1,
            confidence_floor_factor: 0.6,
            confirm_frames: 1,
            cooldown_s: 3.0,
            smoothing_window: 5,
            min_phone_frames: 1,
            phone_min_aspect: 0.1,
            phone_max_aspect: 10.0,
            phone_min_area_ratio: 0.0005,
            phone_max_area_ratio: 0.9,
            phone_iou_min: 0.0,
            watch_max_area_ratio: 0.05,
            watch_face_iou_discard: 0.3,
            paper_min_aspect: 0.7,
            paper_max_aspect: 1.4,
            paper_score_factor: 0.9,
        }
    }
}

impl ObjectConfig {
    /// Smoothed-score threshold for an object class
    pub fn threshold_for(&self, event_type: EventType) -> f64 {
        match event_type {
            EventType::Phone => self.phone_conf_threshold,
            _ => self.object_conf_threshold,
        }
    }
}

/// Audio loudness detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Interval between audio samples
    pub poll_interval_ms: u64,
    /// Normalized RMS above which a sample counts as loud
    pub rms_threshold: f64,
    /// Loudness must persist longer than this before NOISE fires
    pub min_duration_s: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 200,
            rms_threshold: 0.025,
            min_duration_s: 0.1,
        }
    }
}

/// All classifier thresholds for one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub attention: AttentionConfig,
    pub presence: PresenceConfig,
    pub multi_face: MultiFaceConfig,
    pub objects: ObjectConfig,
    pub noise: NoiseConfig,
}

impl ThresholdConfig {
    /// Parse and validate a TOML document; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ComputeError> {
        let config: ThresholdConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ComputeError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: ThresholdConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as pretty TOML
    pub fn to_toml_string(&self) -> Result<String, ComputeError> {
        toml::to_string_pretty(self).map_err(|e| ComputeError::ParseError(e.to_string()))
    }

    /// Reject thresholds that would make a classifier misbehave mid-session
    pub fn validate(&self) -> Result<(), ComputeError> {
        let a = &self.attention;
        non_negative("attention.max_yaw_deg", a.max_yaw_deg)?;
        non_negative("attention.max_pitch_deg", a.max_pitch_deg)?;
        unit_interval("attention.min_box_area_ratio", a.min_box_area_ratio)?;
        non_negative("attention.max_center_offset", a.max_center_offset)?;

        let p = &self.presence;
        non_negative("presence.no_face_threshold_s", p.no_face_threshold_s)?;
        non_negative("presence.inattention_threshold_s", p.inattention_threshold_s)?;

        let m = &self.multi_face;
        at_least_one("multi_face.confirm_frames", m.confirm_frames)?;
        unit_interval("multi_face.min_second_face_area_ratio", m.min_second_face_area_ratio)?;

        let o = &self.objects;
        at_least_one("objects.every_n_frames", o.every_n_frames)?;
        unit_interval("objects.object_conf_threshold", o.object_conf_threshold)?;
        unit_interval("objects.phone_conf_threshold", o.phone_conf_threshold)?;
        unit_interval("objects.confidence_floor_factor", o.confidence_floor_factor)?;
        at_least_one("objects.confirm_frames", o.confirm_frames)?;
        non_negative("objects.cooldown_s", o.cooldown_s)?;
        if o.smoothing_window == 0 {
            return Err(ComputeError::InvalidConfig(
                "objects.smoothing_window must be at least 1".to_string(),
            ));
        }
        at_least_one("objects.min_phone_frames", o.min_phone_frames)?;
        ordered_range(
            "objects.phone_min_aspect",
            o.phone_min_aspect,
            "objects.phone_max_aspect",
            o.phone_max_aspect,
        )?;
        unit_interval("objects.phone_min_area_ratio", o.phone_min_area_ratio)?;
        unit_interval("objects.phone_max_area_ratio", o.phone_max_area_ratio)?;
        ordered_range(
            "objects.phone_min_area_ratio",
            o.phone_min_area_ratio,
            "objects.phone_max_area_ratio",
            o.phone_max_area_ratio,
        )?;
        unit_interval("objects.phone_iou_min", o.phone_iou_min)?;
        unit_interval("objects.watch_max_area_ratio", o.watch_max_area_ratio)?;
        unit_interval("objects.watch_face_iou_discard", o.watch_face_iou_discard)?;
        ordered_range(
            "objects.paper_min_aspect",
            o.paper_min_aspect,
            "objects.paper_max_aspect",
            o.paper_max_aspect,
        )?;
        unit_interval("objects.paper_score_factor", o.paper_score_factor)?;

        let n = &self.noise;
        if n.poll_interval_ms == 0 {
            return Err(ComputeError::InvalidConfig(
                "noise.poll_interval_ms must be positive".to_string(),
            ));
        }
        non_negative("noise.rms_threshold", n.rms_threshold)?;
        non_negative("noise.min_duration_s", n.min_duration_s)?;

        Ok(())
    }
}

fn non_negative(name: &str, value: f64) -> Result<(), ComputeError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ComputeError::InvalidConfig(format!(
            "{name} must be a non-negative number, got {value}"
        )))
    }
}

fn unit_interval(name: &str, value: f64) -> Result<(), ComputeError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ComputeError::InvalidConfig(format!(
            "{name} must be in [0, 1], got {value}"
        )))
    }
}

fn at_least_one(name: &str, value: u32) -> Result<(), ComputeError> {
    if value >= 1 {
        Ok(())
    } else {
        Err(ComputeError::InvalidConfig(format!("{name} must be at least 1")))
    }
}

fn ordered_range(min_name: &str, min: f64, max_name: &str, max: f64) -> Result<(), ComputeError> {
    non_negative(min_name, min)?;
    non_negative(max_name, max)?;
    if min > max {
        return Err(ComputeError::InvalidConfig(format!(
            "{min_name} ({min}) must not exceed {max_name} ({max})"
        )));
    }
    Ok(())
}

/// Per-event-type score penalties used by the integrity scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeductionTable {
    deductions: BTreeMap<EventType, f64>,
}

impl Default for DeductionTable {
    fn default() -> Self {
        Self::from_pairs([
            (EventType::Phone, 30.0),
            (EventType::Book, 15.0),
            (EventType::Watch, 10.0),
            (EventType::Paper, 10.0),
            (EventType::Inattention, 2.0),
            (EventType::NoFace, 5.0),
            (EventType::MultipleFaces, 10.0),
            (EventType::Noise, 5.0),
        ])
    }
}

impl DeductionTable {
    /// Table with no penalties
    pub fn empty() -> Self {
        Self {
            deductions: BTreeMap::new(),
        }
    }

    pub fn from_pairs<I: IntoIterator<Item = (EventType, f64)>>(pairs: I) -> Self {
        Self {
            deductions: pairs.into_iter().collect(),
        }
    }

    /// Parse and validate a JSON object such as `{"PHONE": 30, "BOOK": 15}`
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let table: DeductionTable = serde_json::from_str(json)?;
        table.validate()?;
        Ok(table)
    }

    /// Set one penalty; rejects negative and non-finite values
    pub fn set(&mut self, event_type: EventType, penalty: f64) -> Result<(), ComputeError> {
        non_negative(&format!("deduction for {event_type}"), penalty)?;
        self.deductions.insert(event_type, penalty);
        Ok(())
    }

    /// Penalty for one occurrence; unlisted types and unusable entries
    /// (negative or non-finite, only reachable through `from_pairs`) cost nothing
    pub fn penalty(&self, event_type: EventType) -> f64 {
        self.deductions
            .get(&event_type)
            .copied()
            .filter(|p| p.is_finite() && *p >= 0.0)
            .unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EventType, &f64)> {
        self.deductions.iter()
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        for (event_type, penalty) in &self.deductions {
            non_negative(&format!("deduction for {event_type}"), *penalty)?;
        }
        Ok(())
    }
}
