#![allow(dead_code)]

use tugtrack::keypoints::{RawKeypoint, RawPosition};
use tugtrack::RawPose;

/// Which way the hip line points: `1.0` faces the camera, `-1.0` faces away.
pub const FACING: f64 = 1.0;
pub const AWAY: f64 = -1.0;

/// Pixel distance between the hips in every synthetic pose.
pub const HIP_PX: f64 = 35.0;

/// Synthetic single pose: left hip at `(100, hip_y)`, right hip `HIP_PX`
/// along `facing`, shoulder 100 px above the left hip and the knee placed so
/// the left shoulder-hip-knee angle equals `hip_angle_deg`.
pub fn pose(t: u64, hip_angle_deg: f64, hip_y: f64, facing: f64) -> RawPose {
    let hip = (100.0, hip_y);
    let knee_dir = (180.0 - hip_angle_deg).to_radians();
    let kp = |part: &str, x: f64, y: f64| RawKeypoint {
        part: part.to_string(),
        score: 0.9,
        position: RawPosition { x, y },
    };
    RawPose {
        timestamp: Some(t),
        score: 0.95,
        keypoints: vec![
            kp("leftShoulder", hip.0, hip.1 - 100.0),
            kp("leftHip", hip.0, hip.1),
            kp("rightHip", hip.0 + HIP_PX * facing, hip.1),
            kp("leftKnee", hip.0 + 80.0 * knee_dir.sin(), hip.1 + 80.0 * knee_dir.cos()),
            kp("nose", hip.0, hip.1 - 140.0),
        ],
    }
}

/// Complete protocol at the default 0.01 m/px scale, 9.0 s from first
/// motion to seated.
pub fn full_protocol() -> Vec<RawPose> {
    vec![
        pose(1_000, 170.0, 200.0, FACING),  // seated, session armed
        pose(1_500, 150.0, 200.0, FACING),  // rising
        pose(3_000, 180.0, 200.0, FACING),  // upright
        pose(4_000, 180.0, 250.0, FACING),  // 0.5 m
        pose(5_500, 180.0, 290.0, FACING),  // 0.9 m
        pose(6_000, 180.0, 290.0, AWAY),    // turned
        pose(8_500, 180.0, 200.0, AWAY),    // back 0.9 m
        pose(9_200, 180.0, 200.0, FACING),  // turned again
        pose(10_500, 90.0, 200.0, FACING),  // seated
    ]
}
