//! Session recorder and TUG report export.
//!
//! Collects the tracked shoulder trajectory on every tick and, once the
//! session is complete, turns the phase timestamps into a report that
//! serialises to the `time,x,y` + `TUG Times` CSV layout (or JSON).

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::TugError;
use crate::keypoints::{BodyPart, Frame};
use crate::phase::{Boundary, Segment, TugSession};

/// One recorded position of the tracked point, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Epoch milliseconds.
    pub time: u64,
    pub x: f64,
    pub y: f64,
}

/// Owns the sample trajectory; reads the session only to build the report.
pub struct SessionRecorder {
    tracked: BodyPart,
    min_confidence: f64,
    samples: Vec<Sample>,
}

impl SessionRecorder {
    /// Tracks the left shoulder.
    pub fn new(min_confidence: f64) -> Self {
        Self {
            tracked: BodyPart::LeftShoulder,
            min_confidence,
            samples: Vec::new(),
        }
    }

    pub fn tracked_part(&self) -> BodyPart {
        self.tracked
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }

    /// Append the tracked point of `frame` when it is confident enough.
    pub fn observe(&mut self, frame: &Frame) -> Option<Sample> {
        let point = frame.position(self.tracked, self.min_confidence)?;
        let sample = Sample {
            time: frame.timestamp_ms,
            x: point.x,
            y: point.y,
        };
        self.samples.push(sample);
        Some(sample)
    }

    /// Build the report of a completed session.
    pub fn report(&self, session_id: Uuid, session: &TugSession) -> Result<TugReport, TugError> {
        if !session.is_complete() {
            return Err(TugError::IncompleteSession("sitDownEnd"));
        }

        let mut durations = Vec::with_capacity(Segment::ALL.len());
        for segment in Segment::ALL {
            let seconds = session.timestamps.duration_s(segment).ok_or_else(|| {
                let (start, end) = segment.bounds();
                let missing = if session.timestamps.get(start).is_none() { start } else { end };
                TugError::IncompleteSession(missing.as_str())
            })?;
            durations.push(SegmentDuration {
                segment,
                label: segment.label(),
                seconds,
            });
        }
        let total_s = session
            .timestamps
            .total_s()
            .ok_or(TugError::IncompleteSession(Boundary::StandUpStart.as_str()))?;

        info!(
            "Session {} complete: {:.2}s total, {} samples",
            session_id,
            total_s,
            self.samples.len()
        );

        Ok(TugReport {
            session_id,
            generated_at: Utc::now(),
            total_s,
            durations,
            samples: self.samples.clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentDuration {
    pub segment: Segment,
    pub label: &'static str,
    pub seconds: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TugReport {
    pub session_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub total_s: f64,
    /// Six segments in protocol order.
    pub durations: Vec<SegmentDuration>,
    pub samples: Vec<Sample>,
}

impl TugReport {
    pub fn duration_of(&self, segment: Segment) -> Option<f64> {
        self.durations
            .iter()
            .find(|d| d.segment == segment)
            .map(|d| d.seconds)
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::from("time,x,y\n");
        for s in &self.samples {
            out.push_str(&format!("{},{},{}\n", s.time, s.x, s.y));
        }
        out.push_str("TUG Times\n");
        out.push_str(&format!("Total Time,{:.2}\n", self.total_s));
        for d in &self.durations {
            out.push_str(&format!("{},{:.2}\n", d.label, d.seconds));
        }
        out
    }

    /// Completion text shown to the subject.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Done!".to_string(),
            format!("Total Time: {:.2} s", self.total_s),
        ];
        for d in &self.durations {
            lines.push(format!("{}: {:.2} s", d.label, d.seconds));
        }
        lines.join("\n")
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), TugError> {
        fs::write(path, self.to_csv())?;
        info!("TUG report written to {}", path.display());
        Ok(())
    }

    pub fn write_json(&self, path: &Path) -> Result<(), TugError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("TUG report written to {}", path.display());
        Ok(())
    }
}
