//! The common projection interface implemented by all three models.

use camcal_core::{Pt2, Real, Vec3};

use crate::Intrinsics;

/// A calibrated camera model: camera-frame points to pixels and back.
pub trait CameraModel {
    /// Project a point in camera coordinates to pixel coordinates.
    ///
    /// Returns `None` when the point cannot be imaged (e.g. at or behind
    /// the projection center for the pinhole model).
    fn project(&self, p: &Vec3) -> Option<Pt2>;

    /// Back-project a pixel to a unit-norm ray in camera coordinates.
    fn unproject(&self, px: &Pt2) -> Option<Vec3>;

    /// Pinhole part of the model.
    fn intrinsics(&self) -> &Intrinsics;

    /// Distortion coefficients in the model's persisted order.
    fn distortion_coeffs(&self) -> Vec<Real>;
}
