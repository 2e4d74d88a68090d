//! Linear algebra type aliases shared across the workspace.

use serde::{Deserialize, Serialize};

/// Scalar type used throughout the calibration pipeline.
pub type Real = f64;

/// 2D point (pixel or normalized image coordinates).
pub type Pt2 = nalgebra::Point2<Real>;
/// 3D point (board or camera coordinates).
pub type Pt3 = nalgebra::Point3<Real>;
/// 2D vector.
pub type Vec2 = nalgebra::Vector2<Real>;
/// 3D vector.
pub type Vec3 = nalgebra::Vector3<Real>;
/// 3x3 matrix (intrinsics, homographies, rotations).
pub type Mat3 = nalgebra::Matrix3<Real>;
/// Rigid transform (board-to-camera pose).
pub type Iso3 = nalgebra::Isometry3<Real>;

/// Pixel dimensions of a calibration image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
