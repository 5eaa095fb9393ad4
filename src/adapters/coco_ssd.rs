//! COCO-SSD / YOLO style adapter
//!
//! Parses flat prediction lists (ml5, TensorFlow.js COCO-SSD). Different
//! releases name the same fields differently, so each field is coalesced from
//! its known spellings. Boxes are already in pixels.

use crate::error::ComputeError;
use crate::types::{BoundingBox, Detection, ProviderKind};
use serde::Deserialize;
use tracing::debug;

use super::{span, DetectionAdapter};

/// COCO-SSD payload adapter
pub struct CocoSsdAdapter;

impl DetectionAdapter for CocoSsdAdapter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::CocoSsd
    }

    fn normalize(
        &self,
        raw_json: &str,
        _frame_width: f64,
        _frame_height: f64,
    ) -> Result<Vec<Detection>, ComputeError> {
        let payload: CocoPayload = serde_json::from_str(raw_json)?;
        let predictions = match payload {
            CocoPayload::List(list) => list,
            CocoPayload::Wrapped { predictions } => predictions,
        };

        let detections = predictions
            .into_iter()
            .filter_map(|p| {
                let detection = p.into_detection();
                if detection.is_none() {
                    debug!("coco_ssd prediction without a label dropped");
                }
                detection
            })
            .collect();

        Ok(detections)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CocoPayload {
    List(Vec<CocoPrediction>),
    Wrapped { predictions: Vec<CocoPrediction> },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CocoPrediction {
    label: Option<String>,
    class_name: Option<String>,
    class: Option<String>,
    confidence: Option<f64>,
    score: Option<f64>,
    x: Option<f64>,
    xmin: Option<f64>,
    left: Option<f64>,
    y: Option<f64>,
    ymin: Option<f64>,
    top: Option<f64>,
    w: Option<f64>,
    width: Option<f64>,
    xmax: Option<f64>,
    h: Option<f64>,
    height: Option<f64>,
    ymax: Option<f64>,
    /// TensorFlow.js `[x, y, width, height]`
    bbox: Option<[f64; 4]>,
}

impl CocoPrediction {
    fn into_detection(self) -> Option<Detection> {
        let bbox = self.bounding_box();
        let label = [self.label, self.class_name, self.class]
            .into_iter()
            .flatten()
            .find(|l| !l.trim().is_empty())?;
        let score = self.confidence.or(self.score).unwrap_or(0.0);

        Some(Detection::new(label, score, bbox, ProviderKind::CocoSsd))
    }

    fn bounding_box(&self) -> Option<BoundingBox> {
        if let Some([x, y, w, h]) = self.bbox {
            return Some(BoundingBox::new(x, y, w, h));
        }

        let x = self.x.or(self.xmin).or(self.left);
        let y = self.y.or(self.ymin).or(self.top);
        let w = self.w.or(self.width).or_else(|| span(self.xmax, self.xmin))?;
        let h = self.h.or(self.height).or_else(|| span(self.ymax, self.ymin))?;

        Some(BoundingBox::new(x.unwrap_or(0.0), y.unwrap_or(0.0), w, h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(json: &str) -> Vec<Detection> {
        CocoSsdAdapter.normalize(json, 640.0, 480.0).unwrap()
    }

    #[test]
    fn test_ml5_style_predictions() {
        let json = r#"[
            {"label": "cell phone", "confidence": 0.82, "x": 10, "y": 20, "w": 50, "h": 90},
            {"label": "book", "confidence": 0.4, "x": 100, "y": 120, "width": 200, "height": 150}
        ]"#;
        let detections = normalize(json);

        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].label, "cell phone");
        assert_eq!(detections[0].score, 0.82);
        assert_eq!(detections[0].bbox, Some(BoundingBox::new(10.0, 20.0, 50.0, 90.0)));
        assert_eq!(detections[1].bbox, Some(BoundingBox::new(100.0, 120.0, 200.0, 150.0)));
        assert_eq!(detections[1].source, ProviderKind::CocoSsd);
    }

    #[test]
    fn test_corner_coordinates() {
        let json = r#"{"predictions": [
            {"className": "book", "score": 0.7, "xmin": 0, "ymin": 10, "xmax": 40, "ymax": 70}
        ]}"#;
        let detections = normalize(json);
        assert_eq!(detections[0].label, "book");
        assert_eq!(detections[0].bbox, Some(BoundingBox::new(0.0, 10.0, 40.0, 60.0)));
    }

    #[test]
    fn test_tfjs_bbox_array() {
        let json = r#"[{"class": "clock", "score": 0.6, "bbox": [1, 2, 3, 4]}]"#;
        let detections = normalize(json);
        assert_eq!(detections[0].label, "clock");
        assert_eq!(detections[0].bbox, Some(BoundingBox::new(1.0, 2.0, 3.0, 4.0)));
    }

    #[test]
    fn test_missing_fields_degrade() {
        let json = r#"[{"label": "book"}, {"label": "", "score": 0.9}, {"score": 0.9}]"#;
        let detections = normalize(json);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].score, 0.0);
        assert!(detections[0].bbox.is_none());
    }

    #[test]
    fn test_invalid_json() {
        assert!(CocoSsdAdapter.normalize("not json", 640.0, 480.0).is_err());
    }
}
