//! Error taxonomy for the TUG pipeline.
//!
//! Only `ModelUnavailable` and I/O failures end a session. Everything else is
//! local to one tick: the tick is skipped or the phase machine stalls.

use thiserror::Error;

use crate::phase::Phase;

#[derive(Debug, Error)]
pub enum TugError {
    #[error("pose model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("pose acquisition failed: {0}")]
    AcquisitionFailure(String),

    #[error("pose confidence {score:.2} below minimum {min:.2}")]
    LowConfidence { score: f64, min: f64 },

    #[error("unknown body part: {0}")]
    UnknownBodyPart(String),

    #[error("degenerate triangle: two of the three points coincide")]
    DegenerateTriangle,

    #[error("degenerate scale: hip keypoints coincide")]
    DegenerateScale,

    #[error("degenerate direction: zero-length vector")]
    DegenerateDirection,

    #[error("unexpected state in phase {phase:?}: {reason}")]
    UnexpectedPhase { phase: Phase, reason: String },

    #[error("session incomplete: {0} not recorded")]
    IncompleteSession(&'static str),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl TugError {
    /// Whether the error only costs the current tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TugError::AcquisitionFailure(_)
                | TugError::LowConfidence { .. }
                | TugError::UnknownBodyPart(_)
                | TugError::DegenerateTriangle
                | TugError::DegenerateScale
                | TugError::DegenerateDirection
                | TugError::UnexpectedPhase { .. }
        )
    }
}
