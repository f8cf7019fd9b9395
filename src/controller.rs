//! Session controller: the `start` / `stop` / tick control surface.
//!
//! Owns the session state and runs one pose through the full tick pipeline:
//! adapter → recorder → sampler → phase machine. Ticks are strictly
//! sequential; the controller never blocks or awaits.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::TugConfig;
use crate::error::TugError;
use crate::geometry::pixel_to_metric_scale;
use crate::keypoints::{BodyPart, Frame, RawPose};
use crate::phase::{Phase, PhaseMachine, Step, TugSession};
use crate::recorder::{Sample, SessionRecorder, TugReport};
use crate::sampler::{MotionSampler, SpeedReading};

#[derive(Debug)]
pub enum TickOutcome {
    /// Not running; input ignored.
    Idle,
    /// Per-tick failure (acquisition, low confidence, bad part name).
    Skipped(TugError),
    Progress {
        step: Step,
        phase: Phase,
        speed: Option<SpeedReading>,
    },
    /// Inconsistent session discarded; ticking continues from `AwaitingStart`.
    Reset(TugError),
    /// Terminal phase reached; ticking has halted.
    Completed(TugReport),
}

pub struct TugController {
    cfg: TugConfig,
    machine: PhaseMachine,
    sampler: MotionSampler,
    recorder: SessionRecorder,
    session: TugSession,
    session_id: Uuid,
    running: bool,
}

impl TugController {
    pub fn new(cfg: TugConfig) -> Self {
        Self {
            machine: PhaseMachine::new(cfg.tug.clone()),
            sampler: MotionSampler::new(&cfg.sampler),
            recorder: SessionRecorder::new(cfg.confidence.min_keypoint),
            session: TugSession::new(),
            session_id: Uuid::new_v4(),
            running: false,
            cfg,
        }
    }

    /// Reset all state and begin accepting ticks.
    pub fn start(&mut self) -> Uuid {
        self.reset();
        self.session_id = Uuid::new_v4();
        self.running = true;
        info!("TUG session {} started", self.session_id);
        self.session_id
    }

    /// Halt ticking and discard the session, complete or not.
    pub fn stop(&mut self) {
        if self.running {
            info!("TUG session {} stopped in {:?}", self.session_id, self.session.phase);
        }
        self.running = false;
        self.reset();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    pub fn prompt(&self) -> &'static str {
        self.session.phase.prompt()
    }

    pub fn session(&self) -> &TugSession {
        &self.session
    }

    /// Tracked-point trajectory of the current session.
    pub fn samples(&self) -> &[Sample] {
        self.recorder.samples()
    }

    /// One tick. Fatal errors (`ModelUnavailable`) stop the session and are
    /// returned; everything else is reported through [`TickOutcome`].
    pub fn tick(&mut self, input: Result<RawPose, TugError>) -> Result<TickOutcome, TugError> {
        if !self.running {
            return Ok(TickOutcome::Idle);
        }

        let pose = match input {
            Ok(pose) => pose,
            Err(err) if err.is_transient() => {
                debug!("Tick skipped: {}", err);
                return Ok(TickOutcome::Skipped(err));
            }
            Err(err) => {
                warn!("Fatal pose input error: {}", err);
                self.stop();
                return Err(err);
            }
        };

        let timestamp_ms = pose.timestamp.unwrap_or_else(now_ms);
        let frame = match Frame::from_pose(&pose, timestamp_ms, self.cfg.confidence.min_pose) {
            Ok(frame) => frame,
            Err(err) => {
                debug!("Frame rejected: {}", err);
                return Ok(TickOutcome::Skipped(err));
            }
        };

        self.recorder.observe(&frame);
        let speed = self.sample_speed(&frame);

        let step = match self.machine.tick(&mut self.session, &frame) {
            Ok(step) => step,
            Err(err) => {
                self.sampler.reset();
                self.recorder.reset();
                return Ok(TickOutcome::Reset(err));
            }
        };

        if let Step::Completed(_) = step {
            let report = self.recorder.report(self.session_id, &self.session)?;
            self.running = false;
            return Ok(TickOutcome::Completed(report));
        }

        Ok(TickOutcome::Progress {
            step,
            phase: self.session.phase,
            speed,
        })
    }

    fn sample_speed(&mut self, frame: &Frame) -> Option<SpeedReading> {
        let tracked = frame.position(self.recorder.tracked_part(), self.cfg.confidence.min_keypoint);
        let joint = self.cfg.tug.joint_confidence;
        let scale = match (
            frame.position(BodyPart::LeftHip, joint),
            frame.position(BodyPart::RightHip, joint),
        ) {
            (Some(left), Some(right)) => {
                pixel_to_metric_scale(left, right, self.cfg.tug.hip_separation_m).ok()
            }
            _ => None,
        };
        self.sampler.update(tracked, scale, frame.timestamp_ms)
    }

    fn reset(&mut self) {
        self.session.reset();
        self.sampler.reset();
        self.recorder.reset();
    }
}

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
