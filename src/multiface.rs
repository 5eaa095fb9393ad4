//! Multiple-person confirmation
//!
//! Counts consecutive frames with at least two sizeable faces. The second
//! largest face must cover a minimum fraction of the frame, which filters out
//! reflections and posters picked up as faces.

use crate::config::MultiFaceConfig;
use crate::geometry::bounding_box;
use crate::types::{Event, EventType, Face};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Streak-based state machine for simultaneous faces
#[derive(Debug, Clone, Default)]
pub struct MultiFaceConfirmation {
    config: MultiFaceConfig,
    streak: u32,
    in_violation: bool,
}

impl MultiFaceConfirmation {
    pub fn new(config: MultiFaceConfig) -> Self {
        Self {
            config,
            streak: 0,
            in_violation: false,
        }
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn in_violation(&self) -> bool {
        self.in_violation
    }

    /// Feed one frame's faces, returning an event on confirmation or clearance
    pub fn update(&mut self, faces: &[Face], now: DateTime<Utc>) -> Option<Event> {
        if faces.len() < 2 {
            self.streak = 0;
            if self.in_violation {
                self.in_violation = false;
                info!("multiple faces cleared");
                return Some(Event::new(now, EventType::Info, "Multiple faces cleared"));
            }
            return None;
        }

        let second_area = second_largest_area(faces);
        if second_area < self.config.min_second_face_area_ratio {
            debug!(second_area, "second face too small, streak reset");
            self.streak = 0;
            return None;
        }

        self.streak += 1;
        if self.streak == self.config.confirm_frames && !self.in_violation {
            self.in_violation = true;
            let detail = format!("{} faces detected", faces.len());
            info!(faces = faces.len(), "multiple faces confirmed");
            return Some(Event::new(now, EventType::MultipleFaces, detail));
        }

        None
    }

    pub fn reset(&mut self) {
        self.streak = 0;
        self.in_violation = false;
    }
}

fn second_largest_area(faces: &[Face]) -> f64 {
    let mut areas: Vec<f64> = faces
        .iter()
        .map(|f| bounding_box(&f.landmarks).area())
        .collect();
    areas.sort_by(|a, b| b.total_cmp(a));
    areas.get(1).copied().unwrap_or(0.0)
}
