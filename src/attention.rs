//! Attention classification
//!
//! A pure per-frame verdict from face landmarks: pick the most relevant face,
//! estimate head yaw/pitch from a handful of fixed landmarks, and compare the
//! pose and framing against [`AttentionConfig`].

use crate::config::AttentionConfig;
use crate::geometry::bounding_box;
use crate::types::{landmark_index, AttentionVerdict, Face};

/// Linear factor converting normalized landmark offsets to degrees
pub const DEGREES_PER_UNIT_OFFSET: f64 = 180.0;

/// Estimated head orientation
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeadPose {
    pub yaw_deg: f64,
    pub pitch_deg: f64,
    /// False when a required landmark was missing
    pub valid: bool,
}

/// Stateless attention classifier
#[derive(Debug, Clone, Default)]
pub struct AttentionClassifier {
    config: AttentionConfig,
}

impl AttentionClassifier {
    pub fn new(config: AttentionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AttentionConfig {
        &self.config
    }

    /// Classify one frame's faces
    pub fn classify(&self, faces: &[Face]) -> AttentionVerdict {
        let Some(face) = primary_face(faces) else {
            return AttentionVerdict::default();
        };

        let pose = estimate_head_pose(face);
        let bbox_area = bounding_box(&face.landmarks).area();
        let center_offset = face
            .landmark(landmark_index::NOSE_TIP)
            .map(|nose| (nose.x - 0.5).abs())
            .unwrap_or(0.0);

        let cfg = &self.config;
        let attentive = pose.valid
            && pose.yaw_deg.abs() <= cfg.max_yaw_deg
            && pose.pitch_deg.abs() <= cfg.max_pitch_deg
            && bbox_area >= cfg.min_box_area_ratio
            && center_offset <= cfg.max_center_offset;

        AttentionVerdict {
            attentive,
            yaw_deg: pose.yaw_deg,
            pitch_deg: pose.pitch_deg,
            bbox_area,
            center_offset,
            face_count: faces.len(),
        }
    }
}

/// Face with the largest landmark box; the first one wins a tie
pub fn primary_face(faces: &[Face]) -> Option<&Face> {
    let mut best: Option<(&Face, f64)> = None;
    for face in faces {
        let area = bounding_box(&face.landmarks).area();
        match best {
            Some((_, best_area)) if area <= best_area => {}
            _ => best = Some((face, area)),
        }
    }
    best.map(|(face, _)| face)
}

/// Yaw from the nose tip against the eye midpoint, pitch from the nose tip
/// against the forehead/chin midpoint.
pub fn estimate_head_pose(face: &Face) -> HeadPose {
    let (Some(eye_l), Some(eye_r), Some(nose), Some(chin), Some(forehead)) = (
        face.landmark(landmark_index::LEFT_EYE),
        face.landmark(landmark_index::RIGHT_EYE),
        face.landmark(landmark_index::NOSE_TIP),
        face.landmark(landmark_index::CHIN),
        face.landmark(landmark_index::FOREHEAD),
    ) else {
        return HeadPose::default();
    };

    let eye_mid_x = (eye_l.x + eye_r.x) / 2.0;
    let vertical_mid_y = (forehead.y + chin.y) / 2.0;

    HeadPose {
        yaw_deg: (nose.x - eye_mid_x) * DEGREES_PER_UNIT_OFFSET,
        pitch_deg: (nose.y - vertical_mid_y) * DEGREES_PER_UNIT_OFFSET,
        valid: true,
    }
}
