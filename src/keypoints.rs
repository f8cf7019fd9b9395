//! Keypoint frame adapter.
//!
//! Converts one raw pose-estimation result into a [`Frame`]: a fixed-size
//! table of named keypoints indexed by [`BodyPart`], rejected outright when
//! the overall pose score is below the configured minimum.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TugError;
use crate::geometry::Vector2;

// ─── Body parts ──────────────────────────────────────────────────────────────

/// The 17 keypoints reported by single-pose models (PoseNet / COCO order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BodyPart {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl BodyPart {
    pub const COUNT: usize = 17;

    pub const ALL: [BodyPart; BodyPart::COUNT] = [
        BodyPart::Nose,
        BodyPart::LeftEye,
        BodyPart::RightEye,
        BodyPart::LeftEar,
        BodyPart::RightEar,
        BodyPart::LeftShoulder,
        BodyPart::RightShoulder,
        BodyPart::LeftElbow,
        BodyPart::RightElbow,
        BodyPart::LeftWrist,
        BodyPart::RightWrist,
        BodyPart::LeftHip,
        BodyPart::RightHip,
        BodyPart::LeftKnee,
        BodyPart::RightKnee,
        BodyPart::LeftAnkle,
        BodyPart::RightAnkle,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BodyPart::Nose          => "nose",
            BodyPart::LeftEye       => "leftEye",
            BodyPart::RightEye      => "rightEye",
            BodyPart::LeftEar       => "leftEar",
            BodyPart::RightEar      => "rightEar",
            BodyPart::LeftShoulder  => "leftShoulder",
            BodyPart::RightShoulder => "rightShoulder",
            BodyPart::LeftElbow     => "leftElbow",
            BodyPart::RightElbow    => "rightElbow",
            BodyPart::LeftWrist     => "leftWrist",
            BodyPart::RightWrist    => "rightWrist",
            BodyPart::LeftHip       => "leftHip",
            BodyPart::RightHip      => "rightHip",
            BodyPart::LeftKnee      => "leftKnee",
            BodyPart::RightKnee     => "rightKnee",
            BodyPart::LeftAnkle     => "leftAnkle",
            BodyPart::RightAnkle    => "rightAnkle",
        }
    }

    pub fn as_snake_str(&self) -> &'static str {
        match self {
            BodyPart::Nose          => "nose",
            BodyPart::LeftEye       => "left_eye",
            BodyPart::RightEye      => "right_eye",
            BodyPart::LeftEar       => "left_ear",
            BodyPart::RightEar      => "right_ear",
            BodyPart::LeftShoulder  => "left_shoulder",
            BodyPart::RightShoulder => "right_shoulder",
            BodyPart::LeftElbow     => "left_elbow",
            BodyPart::RightElbow    => "right_elbow",
            BodyPart::LeftWrist     => "left_wrist",
            BodyPart::RightWrist    => "right_wrist",
            BodyPart::LeftHip       => "left_hip",
            BodyPart::RightHip      => "right_hip",
            BodyPart::LeftKnee      => "left_knee",
            BodyPart::RightKnee     => "right_knee",
            BodyPart::LeftAnkle     => "left_ankle",
            BodyPart::RightAnkle    => "right_ankle",
        }
    }
}

impl FromStr for BodyPart {
    type Err = TugError;

    /// Accepts exactly `leftShoulder` or `left_shoulder`; nothing else.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        BodyPart::ALL
            .iter()
            .copied()
            .find(|part| part.as_str() == name || part.as_snake_str() == name)
            .ok_or_else(|| TugError::UnknownBodyPart(name.to_string()))
    }
}

// ─── Raw model output ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RawPosition {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawKeypoint {
    pub part: String,
    pub score: f64,
    pub position: RawPosition,
}

/// One single-pose estimation result as delivered by the vision model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPose {
    /// Capture time in epoch milliseconds; stamped on arrival when absent.
    #[serde(default)]
    pub timestamp: Option<u64>,
    pub score: f64,
    pub keypoints: Vec<RawKeypoint>,
}

// ─── Typed frame ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Keypoint {
    pub part: BodyPart,
    pub x: f64,
    pub y: f64,
    pub confidence: f64,
}

impl Keypoint {
    pub fn position(&self) -> Vector2 {
        Vector2::new(self.x, self.y)
    }
}

/// Keypoints of one acquisition tick, at most one per body part.
#[derive(Debug, Clone)]
pub struct Frame {
    pub timestamp_ms: u64,
    pub score: f64,
    points: [Option<Keypoint>; BodyPart::COUNT],
}

impl Frame {
    pub fn new(timestamp_ms: u64, score: f64) -> Self {
        Self {
            timestamp_ms,
            score,
            points: [None; BodyPart::COUNT],
        }
    }

    /// Adapt a raw pose. Fails with `LowConfidence` below `min_pose_confidence`
    /// and with `UnknownBodyPart` on a misspelled part name. When a part is
    /// reported twice the more confident point wins.
    pub fn from_pose(
        pose: &RawPose,
        timestamp_ms: u64,
        min_pose_confidence: f64,
    ) -> Result<Self, TugError> {
        if pose.score.is_nan() || pose.score < min_pose_confidence {
            return Err(TugError::LowConfidence {
                score: pose.score,
                min: min_pose_confidence,
            });
        }

        let mut frame = Frame::new(timestamp_ms, pose.score);
        for raw in &pose.keypoints {
            let part: BodyPart = raw.part.parse()?;
            frame.insert(Keypoint {
                part,
                x: raw.position.x,
                y: raw.position.y,
                confidence: raw.score,
            });
        }
        Ok(frame)
    }

    pub fn insert(&mut self, keypoint: Keypoint) {
        let slot = &mut self.points[keypoint.part.index()];
        if let Some(existing) = slot {
            if existing.confidence >= keypoint.confidence {
                debug!("Duplicate {} ignored", keypoint.part.as_str());
                return;
            }
        }
        *slot = Some(keypoint);
    }

    pub fn get(&self, part: BodyPart) -> Option<&Keypoint> {
        self.points[part.index()].as_ref()
    }

    /// Position of `part` when detected with at least `min_confidence`.
    pub fn position(&self, part: BodyPart, min_confidence: f64) -> Option<Vector2> {
        self.get(part)
            .filter(|kp| kp.confidence >= min_confidence)
            .map(Keypoint::position)
    }

    pub fn keypoints(&self) -> impl Iterator<Item = &Keypoint> {
        self.points.iter().flatten()
    }
}
