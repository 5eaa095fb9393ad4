//! Proctoring session
//!
//! Owns every classifier's state plus the event log for one assessment.
//! All inputs flow through a single `&mut self`, so classifier updates are
//! serialized; several sessions can run side by side without shared state.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::{DeductionTable, ThresholdConfig};
use crate::error::ComputeError;
use crate::events::EventLog;
use crate::faces::{FaceFrameOutcome, FacePipeline};
use crate::noise::NoiseDetector;
use crate::objects::{ObjectPipeline, ObjectPollOutcome, ProviderHealth};
use crate::outbox::EventOutbox;
use crate::report::compute_report;
use crate::types::{BoundingBox, DetectionFrame, Event, EventType, Report, Session};

/// Combined result of [`ProctorSession::process`]
#[derive(Debug, Clone, Default)]
pub struct FrameOutcome {
    pub face: FaceFrameOutcome,
    /// Present when the frame carried an object poll
    pub objects: Option<ObjectPollOutcome>,
    /// Every event committed for this frame, face path first
    pub events: Vec<Event>,
}

/// One running (or stopped) proctoring session
#[derive(Debug)]
pub struct ProctorSession {
    session: Session,
    config: ThresholdConfig,
    faces: FacePipeline,
    objects: ObjectPipeline,
    noise: NoiseDetector,
    health: ProviderHealth,
    log: EventLog,
    outbox: Option<EventOutbox>,
    face_frames: u64,
    last_face_boxes: Vec<BoundingBox>,
}

impl ProctorSession {
    /// Validate the configuration and open a session
    pub fn start(
        candidate_name: &str,
        config: ThresholdConfig,
        now: DateTime<Utc>,
    ) -> Result<Self, ComputeError> {
        Self::start_with_session(Session::new(candidate_name.trim(), now), config)
    }

    /// Open a session with caller-supplied metadata
    pub fn start_with_session(session: Session, config: ThresholdConfig) -> Result<Self, ComputeError> {
        if session.candidate_name.trim().is_empty() {
            return Err(ComputeError::InvalidConfig(
                "candidate name must not be empty".to_string(),
            ));
        }
        config.validate()?;

        info!(session_id = %session.id, candidate = %session.candidate_name, "session started");
        Ok(Self {
            faces: FacePipeline::new(&config),
            objects: ObjectPipeline::new(config.objects.clone()),
            noise: NoiseDetector::new(config.noise.clone()),
            health: ProviderHealth::default(),
            log: EventLog::new(session.id.clone()),
            outbox: None,
            face_frames: 0,
            last_face_boxes: Vec::new(),
            session,
            config,
        })
    }

    /// Start a fresh session for a new candidate, resetting every classifier
    pub fn restart(&mut self, candidate_name: &str, now: DateTime<Utc>) -> Result<(), ComputeError> {
        let outbox_enabled = self.outbox.is_some();
        *self = Self::start(candidate_name, self.config.clone(), now)?;
        if outbox_enabled {
            self.enable_outbox();
        }
        Ok(())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    pub fn events(&self) -> &[Event] {
        self.log.all()
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn is_running(&self) -> bool {
        !self.session.is_closed()
    }

    /// Mirror every committed event into a delivery outbox
    pub fn enable_outbox(&mut self) {
        self.outbox = Some(EventOutbox::new(
            self.session.id.clone(),
            self.session.candidate_name.clone(),
        ));
    }

    pub fn outbox_mut(&mut self) -> Option<&mut EventOutbox> {
        self.outbox.as_mut()
    }

    /// Face frames processed since start
    pub fn face_frames(&self) -> u64 {
        self.face_frames
    }

    /// Whether the driver should run object detection after the latest face frame
    pub fn objects_due(&self) -> bool {
        let every = u64::from(self.config.objects.every_n_frames.max(1));
        self.face_frames > 0 && self.face_frames % every == 0
    }

    /// Face/attention path for one frame
    pub fn classify_frame(&mut self, frame: &DetectionFrame) -> Result<FaceFrameOutcome, ComputeError> {
        self.ensure_running()?;

        let outcome = self.faces.process(frame);
        self.face_frames += 1;
        self.last_face_boxes = outcome.face_boxes.clone();
        self.record(&outcome.events)?;
        Ok(outcome)
    }

    /// Object path for one poll; face boxes come from the latest face frame
    pub fn classify_objects(&mut self, frame: &DetectionFrame) -> Result<ObjectPollOutcome, ComputeError> {
        self.ensure_running()?;

        let now = frame.timestamp;
        let detections = frame.objects.as_deref().unwrap_or_default();
        let mut events = self.health.observe(&frame.provider_failures, detections, now);

        let mut outcome = self
            .objects
            .process(now, detections, &self.last_face_boxes, frame.frame_area());

        events.append(&mut outcome.events);
        outcome.events = events;
        self.record(&outcome.events)?;
        Ok(outcome)
    }

    /// Face path, then the object path when the frame carries an object poll
    pub fn process(&mut self, frame: &DetectionFrame) -> Result<FrameOutcome, ComputeError> {
        let face = self.classify_frame(frame)?;
        let mut events = face.events.clone();

        let objects = match frame.objects {
            Some(_) => {
                let polled = self.classify_objects(frame)?;
                events.extend(polled.events.iter().cloned());
                Some(polled)
            }
            None => None,
        };

        Ok(FrameOutcome {
            face,
            objects,
            events,
        })
    }

    /// Feed one audio RMS reading
    pub fn on_audio_sample(&mut self, rms: f64, now: DateTime<Utc>) -> Result<Option<Event>, ComputeError> {
        self.ensure_running()?;

        let event = self.noise.on_sample(rms, now);
        if let Some(event) = &event {
            self.record(std::slice::from_ref(event))?;
        }
        Ok(event)
    }

    /// Empty the log, leaving a marker event
    pub fn clear_log(&mut self, now: DateTime<Utc>) -> Result<(), ComputeError> {
        self.ensure_running()?;

        self.log.clear()?;
        self.record(&[Event::new(now, EventType::Info, "Log cleared")])
    }

    /// Close the session and freeze the log
    pub fn stop(&mut self, now: DateTime<Utc>) -> Result<&Session, ComputeError> {
        self.ensure_running()?;

        self.session.end_ts = Some(now);
        self.log.freeze();
        info!(session_id = %self.session.id, events = self.log.len(), "session stopped");
        Ok(&self.session)
    }

    /// Report for a stopped session
    pub fn final_report(&self, deductions: &DeductionTable) -> Result<Report, ComputeError> {
        if self.is_running() {
            return Err(ComputeError::SessionActive(self.session.id.clone()));
        }
        Ok(compute_report(&self.session, self.log.all(), deductions))
    }

    /// Provisional report while the session runs, measured up to `now`
    pub fn interim_report(&self, deductions: &DeductionTable, now: DateTime<Utc>) -> Report {
        let mut session = self.session.clone();
        session.end_ts.get_or_insert(now);
        let mut report = compute_report(&session, self.log.all(), deductions);
        report.end_ts = self.session.end_ts;
        report
    }

    pub fn to_csv(&self) -> String {
        self.log.to_csv()
    }

    fn ensure_running(&self) -> Result<(), ComputeError> {
        if self.session.is_closed() {
            return Err(ComputeError::SessionClosed(self.session.id.clone()));
        }
        Ok(())
    }

    fn record(&mut self, events: &[Event]) -> Result<(), ComputeError> {
        for event in events {
            self.log.append(event.clone())?;
            if let Some(outbox) = self.outbox.as_mut() {
                outbox.push(event.clone());
            }
        }
        Ok(())
    }
}
