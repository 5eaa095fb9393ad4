//! Face/attention path
//!
//! Runs once per face frame: attention verdict, multiple-face confirmation,
//! and the no-face / inattention debouncers. The two timers are mutually
//! exclusive for a given frame (no face vs. face present but inattentive).

use crate::attention::AttentionClassifier;
use crate::config::ThresholdConfig;
use crate::debounce::{Debouncer, ResetPolicy};
use crate::geometry::bounding_box;
use crate::multiface::MultiFaceConfirmation;
use crate::types::{AttentionVerdict, BoundingBox, DetectionFrame, Event, EventType};
use tracing::info;

/// Result of classifying one face frame
#[derive(Debug, Clone, Default)]
pub struct FaceFrameOutcome {
    pub attention: AttentionVerdict,
    /// Events committed on this frame, in emission order
    pub events: Vec<Event>,
    /// Live readout of the no-face timer (seconds)
    pub no_face_elapsed_s: f64,
    /// Live readout of the inattention timer (seconds)
    pub inattentive_elapsed_s: f64,
    /// Committed inattention episodes so far this session
    pub inattention_count: u32,
    /// Face boxes in pixel units, used for object overlap filtering
    pub face_boxes: Vec<BoundingBox>,
}

/// Stateful face-frame classifier for one session
#[derive(Debug, Clone)]
pub struct FacePipeline {
    attention: AttentionClassifier,
    multi_face: MultiFaceConfirmation,
    no_face: Debouncer,
    inattention: Debouncer,
    inattention_count: u32,
}

impl FacePipeline {
    pub fn new(config: &ThresholdConfig) -> Self {
        Self {
            attention: AttentionClassifier::new(config.attention.clone()),
            multi_face: MultiFaceConfirmation::new(config.multi_face.clone()),
            no_face: Debouncer::new(config.presence.no_face_threshold_s, ResetPolicy::OnClear),
            inattention: Debouncer::new(
                config.presence.inattention_threshold_s,
                ResetPolicy::OnClear,
            ),
            inattention_count: 0,
        }
    }

    pub fn inattention_count(&self) -> u32 {
        self.inattention_count
    }

    pub fn process(&mut self, frame: &DetectionFrame) -> FaceFrameOutcome {
        let now = frame.timestamp;
        let faces = &frame.faces;
        let attention = self.attention.classify(faces);
        let mut events = Vec::new();

        if let Some(event) = self.multi_face.update(faces, now) {
            events.push(event);
        }

        let has_face = !faces.is_empty();
        let no_face = self.no_face.update(!has_face, now);
        let inattentive = self.inattention.update(has_face && !attention.attentive, now);

        if let Some(after) = no_face.fired_after_s {
            let detail = format!("No face for {after:.1}s");
            info!(%detail, "no-face confirmed");
            events.push(Event::new(now, EventType::NoFace, detail));
        }

        if let Some(after) = inattentive.fired_after_s {
            self.inattention_count += 1;
            let detail = format!(
                "Not looking at screen for {after:.1}s (count {})",
                self.inattention_count
            );
            info!(%detail, "inattention confirmed");
            events.push(Event::new(now, EventType::Inattention, detail));
        }

        let face_boxes = faces
            .iter()
            .map(|f| bounding_box(&f.landmarks).scaled(frame.frame_width, frame.frame_height))
            .collect();

        FaceFrameOutcome {
            attention,
            events,
            no_face_elapsed_s: no_face.elapsed_s,
            inattentive_elapsed_s: inattentive.elapsed_s,
            inattention_count: self.inattention_count,
            face_boxes,
        }
    }

    pub fn reset(&mut self) {
        self.multi_face.reset();
        self.no_face.reset();
        self.inattention.reset();
        self.inattention_count = 0;
    }
}
