//! Planar geometry over image-space keypoints.
//!
//! All functions are pure. Inverse-cosine arguments are clamped to [-1, 1]
//! so noise around colinear configurations never yields NaN; coincident
//! inputs are reported as errors instead.

use serde::{Deserialize, Serialize};

use crate::error::TugError;

/// Below this length an edge or direction is treated as zero.
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn dot(&self, other: Vector2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Vector pointing from `self` to `to`.
    pub fn towards(&self, to: Vector2) -> Vector2 {
        Vector2::new(to.x - self.x, to.y - self.y)
    }

    pub fn midpoint(&self, other: Vector2) -> Vector2 {
        Vector2::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

pub fn planar_distance(p: Vector2, q: Vector2) -> f64 {
    p.towards(q).length()
}

/// Angle at vertex `b` between rays b→a and b→c, in degrees within [0, 180].
///
/// Law of cosines on the three pairwise distances.
pub fn joint_angle_degrees(a: Vector2, b: Vector2, c: Vector2) -> Result<f64, TugError> {
    let ab = planar_distance(a, b);
    let bc = planar_distance(b, c);
    let ac = planar_distance(a, c);

    if ab < EPSILON || bc < EPSILON || ac < EPSILON {
        return Err(TugError::DegenerateTriangle);
    }

    let cos_angle = ((ab * ab + bc * bc - ac * ac) / (2.0 * ab * bc)).clamp(-1.0, 1.0);
    Ok(cos_angle.acos().to_degrees())
}

/// Angle between two direction vectors, in degrees within [0, 180].
pub fn turn_angle_degrees(v1: Vector2, v2: Vector2) -> Result<f64, TugError> {
    let n1 = v1.length();
    let n2 = v2.length();
    if n1 < EPSILON || n2 < EPSILON {
        return Err(TugError::DegenerateDirection);
    }

    let cos_theta = (v1.dot(v2) / (n1 * n2)).clamp(-1.0, 1.0);
    Ok(cos_theta.acos().to_degrees())
}

/// Meters per pixel, from the pixel distance between the hips and their
/// known physical separation.
pub fn pixel_to_metric_scale(
    hip_left: Vector2,
    hip_right: Vector2,
    known_hip_separation_m: f64,
) -> Result<f64, TugError> {
    let pixels = planar_distance(hip_left, hip_right);
    if pixels < EPSILON {
        return Err(TugError::DegenerateScale);
    }
    Ok(known_hip_separation_m / pixels)
}
