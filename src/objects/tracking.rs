//! Per-class temporal state for the object pipeline

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::debounce::seconds_between;
use crate::geometry::box_iou;
use crate::types::BoundingBox;

/// Rolling window of recent instantaneous scores for one class
#[derive(Debug, Clone)]
pub struct ScoreWindow {
    capacity: usize,
    scores: VecDeque<f64>,
}

impl ScoreWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            scores: VecDeque::with_capacity(capacity),
        }
    }

    /// Push a score and return the window average
    pub fn push(&mut self, score: f64) -> f64 {
        self.scores.push_back(score);
        while self.scores.len() > self.capacity {
            self.scores.pop_front();
        }
        self.average()
    }

    pub fn average(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().sum::<f64>() / self.scores.len() as f64
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn clear(&mut self) {
        self.scores.clear();
    }
}

/// Spatial stability of the phone box across polls
#[derive(Debug, Clone, Default)]
pub struct PhoneStability {
    last_box: Option<BoundingBox>,
    stable_frames: u32,
}

impl PhoneStability {
    /// Record the current phone box and return the stability counter.
    ///
    /// The counter extends when the box overlaps the previous one by at least
    /// `iou_min`. With no previous box it restarts at 1. A jump below `iou_min`
    /// also restarts at 1 and drops the reference box, so the next poll starts
    /// a fresh track instead of extending from the jumped-to box.
    pub fn observe(&mut self, bbox: BoundingBox, iou_min: f64) -> u32 {
        match self.last_box {
            Some(last) if box_iou(&last, &bbox) >= iou_min => {
                self.stable_frames += 1;
                self.last_box = Some(bbox);
            }
            Some(_) => {
                self.stable_frames = 1;
                self.last_box = None;
            }
            None => {
                self.stable_frames = 1;
                self.last_box = Some(bbox);
            }
        }
        self.stable_frames
    }

    pub fn stable_frames(&self) -> u32 {
        self.stable_frames
    }

    pub fn last_box(&self) -> Option<&BoundingBox> {
        self.last_box.as_ref()
    }

    pub fn reset(&mut self) {
        self.last_box = None;
        self.stable_frames = 0;
    }
}

/// Consecutive-presence streak plus emission cooldown for one class
#[derive(Debug, Clone, Default)]
pub struct ClassGate {
    streak: u32,
    last_emitted: Option<DateTime<Utc>>,
}

impl ClassGate {
    /// Register a poll where the class was present; true when it should fire
    pub fn present(&mut self, now: DateTime<Utc>, confirm_frames: u32, cooldown_s: f64) -> bool {
        self.streak += 1;
        if self.streak < confirm_frames {
            return false;
        }

        let cooled = match self.last_emitted {
            Some(last) => seconds_between(last, now) >= cooldown_s,
            None => true,
        };
        if cooled {
            self.last_emitted = Some(now);
        }
        cooled
    }

    /// Register a poll where the class was absent
    pub fn absent(&mut self) {
        self.streak = 0;
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn last_emitted(&self) -> Option<DateTime<Utc>> {
        self.last_emitted
    }

    pub fn reset(&mut self) {
        self.streak = 0;
        self.last_emitted = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at_s(s: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + Duration::seconds(s)
    }

    #[test]
    fn test_score_window_averages_recent() {
        let mut window = ScoreWindow::new(3);
        assert_eq!(window.push(0.9), 0.9);
        window.push(0.0);
        window.push(0.0);
        let avg = window.push(0.6);
        assert_eq!(window.len(), 3);
        assert!((avg - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_phone_stability_counter() {
        let mut stability = PhoneStability::default();
        let a = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        let a_shifted = BoundingBox::new(5.0, 0.0, 100.0, 100.0);
        let far = BoundingBox::new(500.0, 500.0, 100.0, 100.0);

        assert_eq!(stability.observe(a, 0.5), 1);
        assert_eq!(stability.observe(a_shifted, 0.5), 2);
        assert_eq!(stability.observe(far, 0.5), 1);
        assert!(stability.last_box().is_none());
        stability.reset();
        assert!(stability.last_box().is_none());
        assert_eq!(stability.observe(far, 0.5), 1);
    }

    #[test]
    fn test_phone_stability_fluctuating_overlap() {
        // consecutive overlaps 0.2, ~0.9, ~0.9
        let boxes = [
            BoundingBox::new(100.0, 100.0, 120.0, 120.0),
            BoundingBox::new(180.0, 100.0, 120.0, 120.0),
            BoundingBox::new(186.0, 100.0, 120.0, 120.0),
            BoundingBox::new(192.0, 100.0, 120.0, 120.0),
        ];
        assert!((box_iou(&boxes[0], &boxes[1]) - 0.2).abs() < 1e-9);
        assert!((box_iou(&boxes[1], &boxes[2]) - 0.9).abs() < 0.01);
        assert!((box_iou(&boxes[2], &boxes[3]) - 0.9).abs() < 0.01);

        let mut stability = PhoneStability::default();
        let counters: Vec<u32> = boxes.iter().map(|b| stability.observe(*b, 0.5)).collect();
        assert_eq!(counters, vec![1, 1, 1, 2]);
    }

    #[test]
    fn test_gate_requires_streak() {
        let mut gate = ClassGate::default();
        assert!(!gate.present(at_s(0), 3, 0.0));
        assert!(!gate.present(at_s(1), 3, 0.0));
        assert!(gate.present(at_s(2), 3, 0.0));
        gate.absent();
        assert_eq!(gate.streak(), 0);
        assert!(!gate.present(at_s(3), 3, 0.0));
    }

    #[test]
    fn test_gate_cooldown() {
        let mut gate = ClassGate::default();
        let fired: Vec<i64> = (0..10).filter(|s| gate.present(at_s(*s), 1, 3.0)).collect();
        assert_eq!(fired, vec![0, 3, 6, 9]);
    }
}
