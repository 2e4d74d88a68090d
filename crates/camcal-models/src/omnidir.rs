//! Omnidirectional (catadioptric) camera, Mei unified model.
//!
//! A point is projected onto the unit sphere, the projection center is
//! shifted by the mirror parameter `xi` along the sphere axis, and the
//! result is distorted radial-tangentially before applying `K` (which may
//! carry skew). This matches `cv::omnidir` with distortion `[k1, k2, p1, p2]`.

use serde::{Deserialize, Serialize};

use camcal_core::{Pt2, Real, Vec3};

use crate::camera::CameraModel;
use crate::intrinsics::Intrinsics;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OmnidirModel {
    pub intrinsics: Intrinsics,
    /// Mirror parameter.
    pub xi: Real,
    /// `[k1, k2, p1, p2]`.
    pub d: [Real; 4],
}

impl OmnidirModel {
    pub fn new(intrinsics: Intrinsics, xi: Real, d: [Real; 4]) -> Self {
        Self { intrinsics, xi, d }
    }

    fn distort(&self, x: Real, y: Real) -> (Real, Real) {
        let [k1, k2, p1, p2] = self.d;
        let r2 = x * x + y * y;
        let radial = 1.0 + k1 * r2 + k2 * r2 * r2;
        let xd = x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let yd = y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
        (xd, yd)
    }

    fn undistort(&self, xd: Real, yd: Real) -> (Real, Real) {
        let [k1, k2, p1, p2] = self.d;
        let mut x = xd;
        let mut y = yd;
        for _ in 0..8 {
            let r2 = x * x + y * y;
            let radial = 1.0 + k1 * r2 + k2 * r2 * r2;
            let dx = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
            let dy = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
            x = (xd - dx) / radial;
            y = (yd - dy) / radial;
        }
        (x, y)
    }
}

impl CameraModel for OmnidirModel {
    fn project(&self, p: &Vec3) -> Option<Pt2> {
        let norm = p.norm();
        if norm < Real::EPSILON {
            return None;
        }
        let s = p / norm;
        let denom = s.z + self.xi;
        // Points outside the model's field of view map behind the shifted
        // projection center.
        if denom <= Real::EPSILON {
            return None;
        }
        let (xd, yd) = self.distort(s.x / denom, s.y / denom);
        Some(self.intrinsics.apply(xd, yd))
    }

    fn unproject(&self, px: &Pt2) -> Option<Vec3> {
        let n = self.intrinsics.invert(px);
        let (x, y) = self.undistort(n.x, n.y);
        let r2 = x * x + y * y;
        let xi = self.xi;

        // Lift to the unit sphere: invert m = (sx, sy) / (sz + xi).
        let disc = 1.0 + (1.0 - xi * xi) * r2;
        if disc < 0.0 {
            return None;
        }
        let factor = (xi + disc.sqrt()) / (1.0 + r2);
        Some(Vec3::new(factor * x, factor * y, factor - xi))
    }

    fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    fn distortion_coeffs(&self) -> Vec<Real> {
        self.d.to_vec()
    }
}
