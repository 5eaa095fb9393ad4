//! MediaPipe object detector adapter
//!
//! Parses `ObjectDetectorResult` payloads. Label and score come from the
//! first category; boxes may be normalized (both sides ≤ 1) and are then
//! scaled to the frame's pixel size.

use crate::error::ComputeError;
use crate::types::{BoundingBox, Detection, ProviderKind};
use serde::Deserialize;

use super::{span, DetectionAdapter};

/// MediaPipe payload adapter
pub struct MediaPipeAdapter;

impl DetectionAdapter for MediaPipeAdapter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::MediaPipe
    }

    fn normalize(
        &self,
        raw_json: &str,
        frame_width: f64,
        frame_height: f64,
    ) -> Result<Vec<Detection>, ComputeError> {
        let payload: MediaPipePayload = serde_json::from_str(raw_json)?;

        let detections = payload
            .detections
            .into_iter()
            .filter_map(|d| {
                let category = d.categories.into_iter().next()?;
                let label = category.category_name.or(category.display_name)?;
                if label.trim().is_empty() {
                    return None;
                }
                let bbox = d
                    .bounding_box
                    .map(|bb| bb.to_pixels(frame_width, frame_height));
                Some(Detection::new(
                    label,
                    category.score.unwrap_or(0.0),
                    bbox,
                    ProviderKind::MediaPipe,
                ))
            })
            .collect();

        Ok(detections)
    }
}

#[derive(Debug, Deserialize)]
struct MediaPipePayload {
    #[serde(default)]
    detections: Vec<MediaPipeDetection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaPipeDetection {
    #[serde(default)]
    categories: Vec<MediaPipeCategory>,
    bounding_box: Option<MediaPipeBox>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaPipeCategory {
    category_name: Option<String>,
    display_name: Option<String>,
    score: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaPipeBox {
    origin_x: Option<f64>,
    origin_y: Option<f64>,
    x_min: Option<f64>,
    y_min: Option<f64>,
    x_max: Option<f64>,
    y_max: Option<f64>,
    width: Option<f64>,
    height: Option<f64>,
}

impl MediaPipeBox {
    fn to_pixels(&self, frame_width: f64, frame_height: f64) -> BoundingBox {
        let x = self.origin_x.or(self.x_min).unwrap_or(0.0);
        let y = self.origin_y.or(self.y_min).unwrap_or(0.0);
        let w = self
            .width
            .or_else(|| span(self.x_max, self.x_min))
            .unwrap_or(0.0);
        let h = self
            .height
            .or_else(|| span(self.y_max, self.y_min))
            .unwrap_or(0.0);

        let raw = BoundingBox::new(x, y, w, h);
        if w <= 1.0 && h <= 1.0 {
            raw.scaled(frame_width, frame_height)
        } else {
            raw
        }
    }
}
