//! Perspective camera with Brown-Conrady distortion.

use serde::{Deserialize, Serialize};

use camcal_core::{Pt2, Real, Vec3};

use crate::camera::CameraModel;
use crate::intrinsics::Intrinsics;

/// Brown-Conrady radial-tangential distortion, persisted as
/// `[k1, k2, p1, p2, k3]` (the `cv::calibrateCamera` layout).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BrownConrady {
    pub k1: Real,
    pub k2: Real,
    pub p1: Real,
    pub p2: Real,
    pub k3: Real,
}

impl BrownConrady {
    /// Distort normalized image coordinates.
    pub fn distort(&self, x: Real, y: Real) -> (Real, Real) {
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;
        let xd = x * radial + 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let yd = y * radial + self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        (xd, yd)
    }

    /// Invert `distort` by fixed-point iteration.
    ///
    /// Converges for the moderate coefficients produced by calibration;
    /// eight iterations match the usual undistort-point loop.
    pub fn undistort(&self, xd: Real, yd: Real) -> (Real, Real) {
        let mut x = xd;
        let mut y = yd;
        for _ in 0..8 {
            let r2 = x * x + y * y;
            let r4 = r2 * r2;
            let r6 = r4 * r2;
            let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;
            let dx = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
            let dy = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
            x = (xd - dx) / radial;
            y = (yd - dy) / radial;
        }
        (x, y)
    }
}

/// Standard perspective camera: `K * distort(p / p.z)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PinholeModel {
    pub intrinsics: Intrinsics,
    pub distortion: BrownConrady,
}

impl PinholeModel {
    pub fn new(intrinsics: Intrinsics, distortion: BrownConrady) -> Self {
        Self {
            intrinsics,
            distortion,
        }
    }
}

impl CameraModel for PinholeModel {
    fn project(&self, p: &Vec3) -> Option<Pt2> {
        if p.z <= Real::EPSILON {
            return None;
        }
        let x = p.x / p.z;
        let y = p.y / p.z;
        let (xd, yd) = self.distortion.distort(x, y);
        Some(self.intrinsics.apply(xd, yd))
    }

    fn unproject(&self, px: &Pt2) -> Option<Vec3> {
        let n = self.intrinsics.invert(px);
        let (x, y) = self.distortion.undistort(n.x, n.y);
        Some(Vec3::new(x, y, 1.0).normalize())
    }

    fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    fn distortion_coeffs(&self) -> Vec<Real> {
        let d = &self.distortion;
        vec![d.k1, d.k2, d.p1, d.p2, d.k3]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn model() -> PinholeModel {
        PinholeModel::new(
            Intrinsics::new(800.0, 790.0, 320.0, 240.0),
            BrownConrady {
                k1: -0.12,
                k2: 0.05,
                p1: 0.001,
                p2: -0.0015,
                k3: 0.0,
            },
        )
    }

    #[test]
    fn optical_axis_hits_principal_point() {
        let px = model().project(&Vec3::new(0.0, 0.0, 2.0)).unwrap();
        assert_relative_eq!(px.x, 320.0, epsilon = 1e-12);
        assert_relative_eq!(px.y, 240.0, epsilon = 1e-12);
    }

    #[test]
    fn points_behind_camera_do_not_project() {
        assert!(model().project(&Vec3::new(0.1, 0.1, -1.0)).is_none());
        assert!(model().project(&Vec3::new(0.1, 0.1, 0.0)).is_none());
    }

    #[test]
    fn zero_distortion_is_pure_pinhole() {
        let m = PinholeModel::new(
            Intrinsics::new(800.0, 790.0, 320.0, 240.0),
            BrownConrady::default(),
        );
        let px = m.project(&Vec3::new(0.5, -0.25, 2.0)).unwrap();
        assert_relative_eq!(px.x, 320.0 + 800.0 * 0.25, epsilon = 1e-12);
        assert_relative_eq!(px.y, 240.0 - 790.0 * 0.125, epsilon = 1e-12);
    }

    #[test]
    fn project_unproject_round_trip() {
        let m = model();
        let p = Vec3::new(0.3, -0.2, 1.0);
        let px = m.project(&p).unwrap();
        let ray = m.unproject(&px).unwrap();
        // Same direction as the input point.
        let dir = p.normalize();
        assert_relative_eq!(ray.x, dir.x, epsilon = 1e-8);
        assert_relative_eq!(ray.y, dir.y, epsilon = 1e-8);
        assert_relative_eq!(ray.z, dir.z, epsilon = 1e-8);
    }

    #[test]
    fn distortion_coeffs_use_opencv_order() {
        assert_eq!(
            model().distortion_coeffs(),
            vec![-0.12, 0.05, 0.001, -0.0015, 0.0]
        );
    }
}
