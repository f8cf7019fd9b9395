//! tugtrack: Timed Up and Go assessment timing from 2D pose keypoints.
//!
//! Pose frames drive a nine-phase machine (seated → stand → walk → turn →
//! walk back → turn → sit). Phase boundaries are timestamped, the tracked
//! shoulder trajectory is recorded, and a completed session exports as CSV.

pub mod config;
pub mod controller;
pub mod error;
pub mod geometry;
pub mod keypoints;
pub mod logging;
pub mod phase;
pub mod pipeline;
pub mod recorder;
pub mod sampler;
pub mod source;

pub use crate::config::{load_config, TugConfig};
pub use crate::controller::{TickOutcome, TugController};
pub use crate::error::TugError;
pub use crate::keypoints::{BodyPart, Frame, RawPose};
pub use crate::phase::{Phase, PhaseMachine, Step, TugSession};
pub use crate::pipeline::{PhaseUpdate, Pipeline, StopHandle};
pub use crate::recorder::{SessionRecorder, TugReport};
