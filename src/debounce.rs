//! Temporal debounce engine
//!
//! Turns a per-frame boolean ("condition held this frame") into at most one
//! event per sustained episode. The condition must hold for longer than the
//! confirmation duration before the debouncer fires.
//!
//! Two reset policies exist:
//! - [`ResetPolicy::OnClear`]: after firing, stay quiet until the condition
//!   clears (no-face, inattention).
//! - [`ResetPolicy::OnFire`]: firing restarts the window, so a continuous
//!   condition fires once per accumulated window (noise).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happens to the episode window once the debouncer fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    OnClear,
    OnFire,
}

/// Outcome of feeding one frame into a debouncer
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DebounceStep {
    /// Seconds the condition has been held (0 when not held); display only
    pub elapsed_s: f64,
    /// Set on the frame the debouncer fires, carrying the sustained duration
    pub fired_after_s: Option<f64>,
}

/// Sustained-condition state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debouncer {
    confirm_after_s: f64,
    policy: ResetPolicy,
    started_at: Option<DateTime<Utc>>,
    fired: bool,
}

impl Debouncer {
    pub fn new(confirm_after_s: f64, policy: ResetPolicy) -> Self {
        Self {
            confirm_after_s,
            policy,
            started_at: None,
            fired: false,
        }
    }

    pub fn confirm_after_s(&self) -> f64 {
        self.confirm_after_s
    }

    pub fn policy(&self) -> ResetPolicy {
        self.policy
    }

    /// Whether the current episode already produced its event
    pub fn has_fired(&self) -> bool {
        self.fired
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Feed one observation taken at `now`
    pub fn update(&mut self, held: bool, now: DateTime<Utc>) -> DebounceStep {
        if !held {
            self.started_at = None;
            self.fired = false;
            return DebounceStep::default();
        }

        let started_at = *self.started_at.get_or_insert(now);
        let elapsed_s = seconds_between(started_at, now);

        if elapsed_s > self.confirm_after_s && !self.fired {
            match self.policy {
                ResetPolicy::OnClear => self.fired = true,
                ResetPolicy::OnFire => self.started_at = None,
            }
            return DebounceStep {
                elapsed_s,
                fired_after_s: Some(elapsed_s),
            };
        }

        DebounceStep {
            elapsed_s,
            fired_after_s: None,
        }
    }

    /// Seconds the condition has been held as of `now`, or 0
    pub fn elapsed_s(&self, now: DateTime<Utc>) -> f64 {
        self.started_at
            .map(|start| seconds_between(start, now))
            .unwrap_or(0.0)
    }

    /// Return to the initial state
    pub fn reset(&mut self) {
        self.started_at = None;
        self.fired = false;
    }
}

/// Non-negative seconds from `start` to `end` at millisecond resolution
pub(crate) fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    ((end - start).num_milliseconds() as f64 / 1000.0).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn at_ms(ms: i64) -> DateTime<Utc> {
        t0() + Duration::milliseconds(ms)
    }

    #[test]
    fn test_fires_once_after_threshold() {
        let mut d = Debouncer::new(10.0, ResetPolicy::OnClear);
        let mut fired = Vec::new();

        // 11 seconds at 10 fps
        for i in 0..=110 {
            let step = d.update(true, at_ms(i * 100));
            if let Some(after) = step.fired_after_s {
                fired.push((i, after));
            }
        }

        assert_eq!(fired.len(), 1);
        let (frame, after) = fired[0];
        assert_eq!(frame, 101);
        assert!((after - 10.1).abs() < 1e-9);
    }

    #[test]
    fn test_does_not_fire_at_exact_threshold() {
        let mut d = Debouncer::new(5.0, ResetPolicy::OnClear);
        d.update(true, at_ms(0));
        let step = d.update(true, at_ms(5_000));
        assert!(step.fired_after_s.is_none());
        assert_eq!(step.elapsed_s, 5.0);
    }

    #[test]
    fn test_clear_resets_progress() {
        let mut d = Debouncer::new(5.0, ResetPolicy::OnClear);
        d.update(true, at_ms(0));
        d.update(true, at_ms(4_900));
        // one clear frame wipes partial progress
        d.update(false, at_ms(5_000));
        let step = d.update(true, at_ms(5_100));
        assert_eq!(step.elapsed_s, 0.0);
        let step = d.update(true, at_ms(10_000));
        assert!(step.fired_after_s.is_none());
        let step = d.update(true, at_ms(10_200));
        assert!(step.fired_after_s.is_some());
    }

    #[test]
    fn test_refires_after_condition_clears() {
        let mut d = Debouncer::new(1.0, ResetPolicy::OnClear);
        d.update(true, at_ms(0));
        assert!(d.update(true, at_ms(1_500)).fired_after_s.is_some());
        assert!(d.has_fired());
        assert!(d.update(true, at_ms(3_000)).fired_after_s.is_none());

        d.update(false, at_ms(3_100));
        assert!(!d.has_fired());
        d.update(true, at_ms(3_200));
        assert!(d.update(true, at_ms(4_300)).fired_after_s.is_some());
    }

    #[test]
    fn test_reset_on_fire_reaccumulates() {
        let mut d = Debouncer::new(1.0, ResetPolicy::OnFire);
        let mut fired_at = Vec::new();
        for i in 0..=50 {
            let now = at_ms(i * 200);
            if d.update(true, now).fired_after_s.is_some() {
                fired_at.push(i * 200);
            }
        }
        // window starts at 0, fires at 1200, restarts at 1400, fires at 2600, ...
        assert_eq!(fired_at[..3], [1_200, 2_600, 4_000]);
        assert!(!d.has_fired());
    }

    #[test]
    fn test_elapsed_readout() {
        let mut d = Debouncer::new(10.0, ResetPolicy::OnClear);
        assert_eq!(d.elapsed_s(at_ms(0)), 0.0);
        d.update(true, at_ms(1_000));
        assert!((d.elapsed_s(at_ms(3_500)) - 2.5).abs() < 1e-9);
        d.reset();
        assert_eq!(d.elapsed_s(at_ms(4_000)), 0.0);
    }

    proptest! {
        #[test]
        fn test_sustained_condition_fires_exactly_once(
            confirm_ms in 100i64..20_000,
            step_ms in 10i64..1_000,
            extra_frames in 1i64..500,
        ) {
            let mut d = Debouncer::new(confirm_ms as f64 / 1000.0, ResetPolicy::OnClear);
            let frames = confirm_ms / step_ms + 1 + extra_frames;
            let fired = (0..=frames)
                .filter(|i| d.update(true, at_ms(i * step_ms)).fired_after_s.is_some())
                .count();
            prop_assert_eq!(fired, 1);
        }
    }
}
