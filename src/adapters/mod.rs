//! Detection provider adapters
//!
//! This module provides adapters that parse raw object-detector JSON output and
//! map it to provider-agnostic [`Detection`] values with pixel-space boxes.

mod coco_ssd;
mod mediapipe;

pub use coco_ssd::CocoSsdAdapter;
pub use mediapipe::MediaPipeAdapter;

use crate::error::ComputeError;
use crate::types::{Detection, ProviderKind};

/// Trait for detection provider adapters
pub trait DetectionAdapter {
    /// Provider this adapter normalizes
    fn provider(&self) -> ProviderKind;

    /// Parse raw JSON and convert to detections.
    ///
    /// `frame_width`/`frame_height` are the pixel dimensions of the frame the
    /// detector ran on, used to scale normalized boxes.
    fn normalize(
        &self,
        raw_json: &str,
        frame_width: f64,
        frame_height: f64,
    ) -> Result<Vec<Detection>, ComputeError>;
}

impl ProviderKind {
    /// Adapter for this provider's payload format
    pub fn adapter(&self) -> Box<dyn DetectionAdapter> {
        match self {
            ProviderKind::CocoSsd => Box::new(CocoSsdAdapter),
            ProviderKind::MediaPipe => Box::new(MediaPipeAdapter),
        }
    }
}

/// `a - b` when both ends are present
fn span(max: Option<f64>, min: Option<f64>) -> Option<f64> {
    Some(max? - min?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_registry() {
        assert_eq!(ProviderKind::CocoSsd.adapter().provider(), ProviderKind::CocoSsd);
        assert_eq!(ProviderKind::MediaPipe.adapter().provider(), ProviderKind::MediaPipe);
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("ml5".parse::<ProviderKind>().unwrap(), ProviderKind::CocoSsd);
        assert_eq!("MediaPipe".parse::<ProviderKind>().unwrap(), ProviderKind::MediaPipe);
        assert!("tensorflow".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_span() {
        assert_eq!(span(Some(10.0), Some(4.0)), Some(6.0));
        assert_eq!(span(Some(10.0), None), None);
    }
}
