//! Background noise detection
//!
//! RMS loudness sampled at a fixed polling interval feeds a reset-on-fire
//! debouncer: continuous sound produces one `NOISE` event per accumulated
//! window rather than one per poll.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::NoiseConfig;
use crate::debounce::{Debouncer, ResetPolicy};
use crate::types::{Event, EventType};

/// Detail carried by every noise event
pub const NOISE_DETAIL: &str = "Background speaking/noise detected";

/// Sustained-loudness detector for one session
#[derive(Debug, Clone)]
pub struct NoiseDetector {
    config: NoiseConfig,
    window: Debouncer,
    last_rms: f64,
}

impl NoiseDetector {
    pub fn new(config: NoiseConfig) -> Self {
        let window = Debouncer::new(config.min_duration_s, ResetPolicy::OnFire);
        Self {
            config,
            window,
            last_rms: 0.0,
        }
    }

    /// How often the driver should sample audio
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.poll_interval_ms)
    }

    /// RMS of the most recent sample, for display
    pub fn last_rms(&self) -> f64 {
        self.last_rms
    }

    /// Whether a loud window is currently accumulating
    pub fn is_active(&self) -> bool {
        self.window.started_at().is_some()
    }

    /// Feed one RMS sample taken at `now`
    pub fn on_sample(&mut self, rms: f64, now: DateTime<Utc>) -> Option<Event> {
        self.last_rms = rms;
        let loud = rms.is_finite() && rms > self.config.rms_threshold;
        let step = self.window.update(loud, now);

        step.fired_after_s.map(|after| {
            info!(rms, sustained_s = after, "noise confirmed");
            Event::new(now, EventType::Noise, NOISE_DETAIL)
        })
    }

    pub fn reset(&mut self) {
        self.window.reset();
        self.last_rms = 0.0;
    }
}

/// RMS of unsigned 8-bit time-domain audio (128 = silence), in [0, 1]
pub fn rms_from_bytes(samples: &[u8]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples
        .iter()
        .map(|b| {
            let v = (f64::from(*b) - 128.0) / 128.0;
            v * v
        })
        .sum();
    (sum / samples.len() as f64).sqrt()
}

/// RMS of float PCM samples in [-1, 1]
pub fn rms_from_samples(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|s| f64::from(*s).powi(2)).sum();
    (sum / samples.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_ms(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + chrono::Duration::milliseconds(ms)
    }

    #[test]
    fn test_rms_from_bytes() {
        assert_eq!(rms_from_bytes(&[128; 2048]), 0.0);
        assert_eq!(rms_from_bytes(&[]), 0.0);
        // alternating full-scale swings
        let loud: Vec<u8> = (0..1024).map(|i| if i % 2 == 0 { 0 } else { 255 }).collect();
        assert!(rms_from_bytes(&loud) > 0.99);
    }

    #[test]
    fn test_rms_from_samples() {
        assert!((rms_from_samples(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-9);
        assert_eq!(rms_from_samples(&[]), 0.0);
    }

    #[test]
    fn test_quiet_audio_never_fires() {
        let mut detector = NoiseDetector::new(NoiseConfig::default());
        for i in 0..100 {
            assert!(detector.on_sample(0.01, at_ms(i * 200)).is_none());
        }
        assert!(!detector.is_active());
    }

    #[test]
    fn test_continuous_noise_fires_every_other_poll() {
        let mut detector = NoiseDetector::new(NoiseConfig::default());
        let fired: Vec<i64> = (0..6)
            .filter(|i| detector.on_sample(0.2, at_ms(i * 200)).is_some())
            .collect();
        // poll 0 opens the window, poll 1 fires and resets, poll 2 reopens, ...
        assert_eq!(fired, vec![1, 3, 5]);
    }

    #[test]
    fn test_event_detail() {
        let mut detector = NoiseDetector::new(NoiseConfig::default());
        detector.on_sample(0.3, at_ms(0));
        let event = detector.on_sample(0.3, at_ms(200)).unwrap();
        assert_eq!(event.event_type, EventType::Noise);
        assert_eq!(event.detail, NOISE_DETAIL);
        assert_eq!(detector.last_rms(), 0.3);
    }

    #[test]
    fn test_quiet_poll_drops_window() {
        let config = NoiseConfig {
            min_duration_s: 1.0,
            ..NoiseConfig::default()
        };
        let mut detector = NoiseDetector::new(config);
        for i in 0..5 {
            detector.on_sample(0.2, at_ms(i * 200));
        }
        detector.on_sample(0.0, at_ms(1_000));
        assert!(!detector.is_active());
        assert!(detector.on_sample(0.2, at_ms(1_200)).is_none());
        assert_eq!(detector.poll_interval(), Duration::from_millis(200));
    }
}
