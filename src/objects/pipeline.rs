//! Object poll processing
//!
//! One call per object poll: aggregate, gate, smooth, then confirm and throttle
//! each tracked class.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::ObjectConfig;
use crate::geometry::box_iou;
use crate::objects::ensemble::aggregate;
use crate::objects::labels::event_for_label;
use crate::objects::tracking::{ClassGate, PhoneStability, ScoreWindow};
use crate::types::{BoundingBox, Detection, Event, EventType};

/// Result of one object poll
#[derive(Debug, Clone, Default)]
pub struct ObjectPollOutcome {
    /// Classes whose smoothed score passed its threshold this poll
    pub present: BTreeSet<EventType>,
    /// Aggregated detections that survived gating, for display
    pub accepted: Vec<Detection>,
    /// Events emitted this poll
    pub events: Vec<Event>,
}

/// Stateful object pipeline for one session
#[derive(Debug, Clone)]
pub struct ObjectPipeline {
    config: ObjectConfig,
    windows: BTreeMap<EventType, ScoreWindow>,
    gates: BTreeMap<EventType, ClassGate>,
    phone: PhoneStability,
}

impl ObjectPipeline {
    pub fn new(config: ObjectConfig) -> Self {
        let windows = EventType::OBJECTS
            .iter()
            .map(|t| (*t, ScoreWindow::new(config.smoothing_window)))
            .collect();
        let gates = EventType::OBJECTS
            .iter()
            .map(|t| (*t, ClassGate::default()))
            .collect();
        Self {
            config,
            windows,
            gates,
            phone: PhoneStability::default(),
        }
    }

    pub fn config(&self) -> &ObjectConfig {
        &self.config
    }

    /// Process one poll.
    ///
    /// `face_boxes` and detection boxes are in pixels; `frame_area` is the
    /// frame's pixel area (area-ratio gates are skipped when it is not positive).
    pub fn process(
        &mut self,
        now: DateTime<Utc>,
        detections: &[Detection],
        face_boxes: &[BoundingBox],
        frame_area: f64,
    ) -> ObjectPollOutcome {
        let mut outcome = ObjectPollOutcome::default();
        let mut phone_tracked = false;

        for (label, detection) in aggregate(detections, &self.config) {
            let Some(event_type) = event_for_label(&label) else {
                debug!(%label, "unmapped detector label ignored");
                continue;
            };

            let threshold = self.config.threshold_for(event_type);
            if detection.score < threshold * self.config.confidence_floor_factor {
                debug!(%label, score = detection.score, "below confidence floor");
                continue;
            }

            let passes = match event_type {
                EventType::Watch => self.watch_gate(&detection, face_boxes, frame_area),
                EventType::Phone => match self.phone_gate(&detection, frame_area) {
                    Some(stable) => {
                        phone_tracked = true;
                        stable >= self.config.min_phone_frames
                    }
                    None => false,
                },
                _ => true,
            };
            if !passes {
                continue;
            }

            let smoothed = match self.windows.get_mut(&event_type) {
                Some(window) => window.push(detection.score),
                None => continue,
            };
            if smoothed < threshold {
                debug!(%label, smoothed, threshold, "smoothed score below threshold");
                continue;
            }

            outcome.present.insert(event_type);
            outcome.accepted.push(detection);
        }

        for event_type in EventType::OBJECTS {
            let Some(gate) = self.gates.get_mut(&event_type) else {
                continue;
            };

            if outcome.present.contains(&event_type) {
                if gate.present(now, self.config.confirm_frames, self.config.cooldown_s) {
                    let detail = format!("{} detected", event_type.as_str().to_lowercase());
                    info!(%event_type, "object confirmed");
                    outcome.events.push(Event::new(now, event_type, detail));
                }
            } else {
                gate.absent();
                if event_type == EventType::Phone && !phone_tracked {
                    self.phone.reset();
                }
            }
        }

        outcome
    }

    fn watch_gate(&self, detection: &Detection, face_boxes: &[BoundingBox], frame_area: f64) -> bool {
        let Some(bbox) = detection.bbox else {
            debug!("watch without a box rejected");
            return false;
        };
        if !bbox.has_extent() {
            debug!("watch box without extent rejected");
            return false;
        }

        if frame_area > 0.0 && bbox.area() / frame_area > self.config.watch_max_area_ratio {
            debug!(area = bbox.area(), "watch box too large");
            return false;
        }

        let overlaps_face = face_boxes
            .iter()
            .any(|face| box_iou(&bbox, face) >= self.config.watch_face_iou_discard);
        if overlaps_face {
            debug!("watch box overlaps a face");
            return false;
        }

        true
    }

    /// Shape checks, then stability tracking. Returns the stability counter,
    /// or `None` when the box was rejected before tracking.
    fn phone_gate(&mut self, detection: &Detection, frame_area: f64) -> Option<u32> {
        let Some(bbox) = detection.bbox else {
            debug!("phone without a box rejected");
            return None;
        };

        let aspect = bbox.aspect_ratio()?;
        if aspect < self.config.phone_min_aspect || aspect > self.config.phone_max_aspect {
            debug!(aspect, "phone aspect out of range");
            return None;
        }

        if frame_area > 0.0 {
            let ratio = bbox.area() / frame_area;
            if ratio < self.config.phone_min_area_ratio || ratio > self.config.phone_max_area_ratio {
                debug!(ratio, "phone area out of range");
                return None;
            }
        }

        let stable = self.phone.observe(bbox, self.config.phone_iou_min);
        if stable < self.config.min_phone_frames {
            debug!(stable, "phone not yet spatially stable");
        }
        Some(stable)
    }

    pub fn reset(&mut self) {
        self.windows.values_mut().for_each(ScoreWindow::clear);
        self.gates.values_mut().for_each(ClassGate::reset);
        self.phone.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProviderKind;
    use chrono::{Duration, TimeZone};

    const FRAME_AREA: f64 = 1280.0 * 720.0;

    fn at_s(s: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + Duration::seconds(s)
    }

    fn det(label: &str, score: f64, bbox: BoundingBox) -> Detection {
        Detection::new(label, score, Some(bbox), ProviderKind::CocoSsd)
    }

    fn phone_box() -> BoundingBox {
        BoundingBox::new(600.0, 300.0, 80.0, 150.0)
    }

    #[test]
    fn test_phone_cooldown_spacing() {
        let mut pipeline = ObjectPipeline::new(ObjectConfig::default());
        let mut fired = Vec::new();
        for s in 0..10 {
            let outcome = pipeline.process(at_s(s), &[det("cell phone", 0.8, phone_box())], &[], FRAME_AREA);
            if !outcome.events.is_empty() {
                assert_eq!(outcome.events[0].detail, "phone detected");
                fired.push(s);
            }
        }
        assert_eq!(fired, vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_phone_requires_stable_box() {
        let config = ObjectConfig {
            min_phone_frames: 2,
            phone_iou_min: 0.5,
            cooldown_s: 0.0,
            ..ObjectConfig::default()
        };
        let mut pipeline = ObjectPipeline::new(config);

        // consecutive overlaps 0.2, ~0.9, ~0.9: counters 1, 1, 1, 2
        let boxes = [
            BoundingBox::new(100.0, 100.0, 120.0, 120.0),
            BoundingBox::new(180.0, 100.0, 120.0, 120.0),
            BoundingBox::new(186.0, 100.0, 120.0, 120.0),
            BoundingBox::new(192.0, 100.0, 120.0, 120.0),
        ];
        let fired: Vec<bool> = boxes
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let outcome = pipeline.process(at_s(i as i64), &[det("phone", 0.9, *b)], &[], FRAME_AREA);
                !outcome.events.is_empty()
            })
            .collect();
        assert_eq!(fired, vec![false, false, false, true]);
    }

    #[test]
    fn test_phone_absence_resets_stability() {
        let config = ObjectConfig {
            min_phone_frames: 2,
            phone_iou_min: 0.5,
            ..ObjectConfig::default()
        };
        let mut pipeline = ObjectPipeline::new(config);
        pipeline.process(at_s(0), &[det("phone", 0.9, phone_box())], &[], FRAME_AREA);
        pipeline.process(at_s(1), &[], &[], FRAME_AREA);
        let outcome = pipeline.process(at_s(2), &[det("phone", 0.9, phone_box())], &[], FRAME_AREA);
        assert!(outcome.events.is_empty());
        let outcome = pipeline.process(at_s(3), &[det("phone", 0.9, phone_box())], &[], FRAME_AREA);
        assert_eq!(outcome.events.len(), 1);
    }

    #[test]
    fn test_phone_shape_gate() {
        let mut pipeline = ObjectPipeline::new(ObjectConfig::default());
        // 0.95 of the frame is above the maximum area ratio
        let huge = BoundingBox::new(0.0, 0.0, 1280.0, 684.0);
        let outcome = pipeline.process(at_s(0), &[det("phone", 0.9, huge)], &[], FRAME_AREA);
        assert!(outcome.present.is_empty());

        let sliver = BoundingBox::new(0.0, 0.0, 400.0, 20.0);
        let outcome = pipeline.process(at_s(1), &[det("phone", 0.9, sliver)], &[], FRAME_AREA);
        assert!(outcome.present.is_empty());
    }

    #[test]
    fn test_watch_overlapping_face_rejected() {
        let mut pipeline = ObjectPipeline::new(ObjectConfig::default());
        let face = BoundingBox::new(500.0, 200.0, 100.0, 100.0);
        let watch = BoundingBox::new(510.0, 210.0, 90.0, 90.0);
        let outcome = pipeline.process(at_s(0), &[det("clock", 0.9, watch)], &[face], FRAME_AREA);
        assert!(outcome.events.is_empty());

        let wrist = BoundingBox::new(100.0, 600.0, 60.0, 60.0);
        let outcome = pipeline.process(at_s(1), &[det("clock", 0.9, wrist)], &[face], FRAME_AREA);
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].event_type, EventType::Watch);
        assert_eq!(outcome.events[0].detail, "watch detected");
    }

    #[test]
    fn test_zero_extent_watch_rejected() {
        let mut pipeline = ObjectPipeline::new(ObjectConfig::default());
        let face = BoundingBox::new(500.0, 200.0, 100.0, 100.0);
        let flat = BoundingBox::new(500.0, 200.0, 0.0, 0.0);
        let outcome = pipeline.process(at_s(0), &[det("clock", 0.9, flat)], &[face], FRAME_AREA);
        assert!(outcome.present.is_empty());
        assert!(outcome.events.is_empty());

        let no_height = BoundingBox::new(100.0, 600.0, 60.0, 0.0);
        let outcome = pipeline.process(at_s(1), &[det("clock", 0.9, no_height)], &[], FRAME_AREA);
        assert!(outcome.events.is_empty());
    }

    #[test]
    fn test_non_finite_score_ignored() {
        let mut pipeline = ObjectPipeline::new(ObjectConfig::default());
        let book = BoundingBox::new(200.0, 200.0, 200.0, 200.0);
        let outcome = pipeline.process(at_s(0), &[det("book", f64::NAN, book)], &[], FRAME_AREA);
        assert!(outcome.present.is_empty());
        assert!(outcome.events.is_empty());

        // sub-threshold polls afterwards stay quiet
        for s in 1..8 {
            let outcome = pipeline.process(at_s(s), &[det("book", 0.25, book)], &[], FRAME_AREA);
            assert!(outcome.events.is_empty(), "fired at poll {s}");
        }

        let outcome = pipeline.process(at_s(8), &[det("phone", f64::INFINITY, phone_box())], &[], FRAME_AREA);
        assert!(outcome.events.is_empty());
    }

    #[test]
    fn test_large_watch_rejected() {
        let mut pipeline = ObjectPipeline::new(ObjectConfig::default());
        let big = BoundingBox::new(0.0, 0.0, 400.0, 400.0);
        let outcome = pipeline.process(at_s(0), &[det("clock", 0.9, big)], &[], FRAME_AREA);
        assert!(outcome.present.is_empty());
    }

    #[test]
    fn test_elongated_book_reports_paper_and_book() {
        let mut pipeline = ObjectPipeline::new(ObjectConfig::default());
        let sheet = BoundingBox::new(200.0, 200.0, 200.0, 400.0);
        let outcome = pipeline.process(at_s(0), &[det("book", 0.8, sheet)], &[], FRAME_AREA);
        let types: Vec<EventType> = outcome.events.iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![EventType::Book, EventType::Paper]);
    }

    #[test]
    fn test_smoothing_damps_single_spike() {
        let mut pipeline = ObjectPipeline::new(ObjectConfig::default());
        let book = BoundingBox::new(200.0, 200.0, 200.0, 200.0);
        // floor is 0.24: these pass the floor but keep the average under 0.4
        for s in 0..4 {
            let outcome = pipeline.process(at_s(s), &[det("book", 0.25, book)], &[], FRAME_AREA);
            assert!(outcome.events.is_empty());
        }
        let outcome = pipeline.process(at_s(4), &[det("book", 0.9, book)], &[], FRAME_AREA);
        // (0.25 * 4 + 0.9) / 5 = 0.38
        assert!(outcome.events.is_empty());
    }

    #[test]
    fn test_confirm_streak_resets_on_absence() {
        let config = ObjectConfig {
            confirm_frames: 2,
            ..ObjectConfig::default()
        };
        let mut pipeline = ObjectPipeline::new(config);
        let book = BoundingBox::new(200.0, 200.0, 200.0, 200.0);
        assert!(pipeline.process(at_s(0), &[det("book", 0.9, book)], &[], FRAME_AREA).events.is_empty());
        assert!(pipeline.process(at_s(1), &[], &[], FRAME_AREA).events.is_empty());
        assert!(pipeline.process(at_s(2), &[det("book", 0.9, book)], &[], FRAME_AREA).events.is_empty());
        assert_eq!(pipeline.process(at_s(3), &[det("book", 0.9, book)], &[], FRAME_AREA).events.len(), 1);
    }

    #[test]
    fn test_unmapped_labels_ignored() {
        let mut pipeline = ObjectPipeline::new(ObjectConfig::default());
        let b = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        let outcome = pipeline.process(at_s(0), &[det("person", 0.99, b), det("cup", 0.9, b)], &[], FRAME_AREA);
        assert!(outcome.present.is_empty());
        assert!(outcome.events.is_empty());
    }
}
