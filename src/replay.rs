//! Recorded-session replay
//!
//! A recording is a sequence of JSON records tagged by `kind`:
//! - `frame`: a [`DetectionFrame`] (faces, optionally an already-normalized object poll)
//! - `audio`: one loudness reading (`rms`, or raw `bytes` / float `samples`)
//! - `provider_payload`: raw detector output per provider for one object poll
//!
//! Records are applied to a [`ProctorSession`] in order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ComputeError;
use crate::noise::{rms_from_bytes, rms_from_samples};
use crate::session::ProctorSession;
use crate::types::{
    DetectionFrame, Event, ProviderFailure, ProviderKind, DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH,
};

/// One line of a recording
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplayRecord {
    Frame(DetectionFrame),
    Audio(AudioReading),
    ProviderPayload(ProviderPoll),
}

impl ReplayRecord {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ReplayRecord::Frame(frame) => frame.timestamp,
            ReplayRecord::Audio(audio) => audio.timestamp,
            ReplayRecord::ProviderPayload(poll) => poll.timestamp,
        }
    }
}

/// Audio loudness at one poll
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioReading {
    pub timestamp: DateTime<Utc>,
    /// Precomputed RMS; takes precedence over raw samples
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rms: Option<f64>,
    /// Unsigned 8-bit time-domain data (128 = silence)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bytes: Vec<u8>,
    /// Float PCM in [-1, 1]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<f32>,
}

impl AudioReading {
    pub fn rms(&self) -> f64 {
        match self.rms {
            Some(rms) => rms,
            None if !self.bytes.is_empty() => rms_from_bytes(&self.bytes),
            None => rms_from_samples(&self.samples),
        }
    }
}

/// Raw output of every provider for one object poll
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderPoll {
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_frame_width")]
    pub frame_width: f64,
    #[serde(default = "default_frame_height")]
    pub frame_height: f64,
    pub outputs: Vec<ProviderOutput>,
}

/// One provider's raw result, or the reason it produced none
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderOutput {
    pub provider: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn default_frame_width() -> f64 {
    DEFAULT_FRAME_WIDTH
}

fn default_frame_height() -> f64 {
    DEFAULT_FRAME_HEIGHT
}

impl ProviderPoll {
    /// Normalize every provider through its adapter into one object frame.
    ///
    /// A provider that reported an error, or whose payload cannot be parsed,
    /// becomes a [`ProviderFailure`]; the others still contribute.
    pub fn to_frame(&self) -> DetectionFrame {
        let mut detections = Vec::new();
        let mut failures = Vec::new();

        for output in &self.outputs {
            let reason = match (&output.error, &output.payload) {
                (Some(error), _) => Some(error.clone()),
                (None, None) => Some("no output".to_string()),
                (None, Some(payload)) => {
                    let adapter = output.provider.adapter();
                    match adapter.normalize(&payload.to_string(), self.frame_width, self.frame_height) {
                        Ok(mut normalized) => {
                            detections.append(&mut normalized);
                            None
                        }
                        Err(e) => {
                            warn!(provider = %output.provider, error = %e, "provider payload could not be normalized");
                            Some(e.to_string())
                        }
                    }
                }
            };

            if let Some(reason) = reason {
                failures.push(ProviderFailure {
                    provider: output.provider,
                    reason,
                });
            }
        }

        let mut frame = DetectionFrame::faces(self.timestamp, Vec::new())
            .with_dimensions(self.frame_width, self.frame_height)
            .with_objects(detections);
        frame.provider_failures = failures;
        frame
    }
}

/// Parse a JSON array of records
pub fn parse_array(json: &str) -> Result<Vec<ReplayRecord>, ComputeError> {
    let records: Vec<ReplayRecord> = serde_json::from_str(json)?;
    Ok(records)
}

/// Parse NDJSON (one record per line, blank lines skipped)
pub fn parse_ndjson(ndjson: &str) -> Result<Vec<ReplayRecord>, ComputeError> {
    let mut records = Vec::new();
    for (line_num, line) in ndjson.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<ReplayRecord>(trimmed) {
            Ok(record) => records.push(record),
            Err(e) => {
                return Err(ComputeError::ParseError(format!(
                    "Failed to parse line {}: {}",
                    line_num + 1,
                    e
                )));
            }
        }
    }
    Ok(records)
}

/// Apply one record to a running session, returning the events it committed
pub fn apply(session: &mut ProctorSession, record: &ReplayRecord) -> Result<Vec<Event>, ComputeError> {
    match record {
        ReplayRecord::Frame(frame) => Ok(session.process(frame)?.events),
        ReplayRecord::Audio(audio) => Ok(session
            .on_audio_sample(audio.rms(), audio.timestamp)?
            .into_iter()
            .collect()),
        ReplayRecord::ProviderPayload(poll) => Ok(session.classify_objects(&poll.to_frame())?.events),
    }
}
