//! Fisheye camera with Kannala-Brandt equidistant distortion.

use serde::{Deserialize, Serialize};

use camcal_core::{Pt2, Real, Vec3};

use crate::camera::CameraModel;
use crate::intrinsics::Intrinsics;

/// Kannala-Brandt fisheye model matching `cv::fisheye`:
/// `theta_d = theta * (1 + k1 th^2 + k2 th^4 + k3 th^6 + k4 th^8)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FisheyeModel {
    pub intrinsics: Intrinsics,
    /// `[k1, k2, k3, k4]`.
    pub k: [Real; 4],
}

impl FisheyeModel {
    pub fn new(intrinsics: Intrinsics, k: [Real; 4]) -> Self {
        Self { intrinsics, k }
    }

    fn theta_d(&self, theta: Real) -> Real {
        let th2 = theta * theta;
        theta
            * (1.0
                + self.k[0] * th2
                + self.k[1] * th2 * th2
                + self.k[2] * th2 * th2 * th2
                + self.k[3] * th2 * th2 * th2 * th2)
    }

    /// Solve `theta_d(theta) = rd` by Newton iteration.
    fn invert_theta_d(&self, rd: Real) -> Real {
        let mut theta = rd;
        for _ in 0..10 {
            let th2 = theta * theta;
            let poly = 1.0
                + self.k[0] * th2
                + self.k[1] * th2 * th2
                + self.k[2] * th2 * th2 * th2
                + self.k[3] * th2 * th2 * th2 * th2;
            let dpoly = 2.0 * theta
                * (self.k[0]
                    + 2.0 * self.k[1] * th2
                    + 3.0 * self.k[2] * th2 * th2
                    + 4.0 * self.k[3] * th2 * th2 * th2);
            let f = theta * poly - rd;
            let df = poly + theta * dpoly;
            if df.abs() < Real::EPSILON {
                break;
            }
            theta -= f / df;
        }
        theta
    }
}

impl CameraModel for FisheyeModel {
    fn project(&self, p: &Vec3) -> Option<Pt2> {
        let r = (p.x * p.x + p.y * p.y).sqrt();
        if p.z <= 0.0 && r < Real::EPSILON {
            return None;
        }
        let theta = r.atan2(p.z);
        let theta_d = self.theta_d(theta);
        let (xr, yr) = if r < 1e-12 {
            (0.0, 0.0)
        } else {
            (p.x / r, p.y / r)
        };
        Some(self.intrinsics.apply(theta_d * xr, theta_d * yr))
    }

    fn unproject(&self, px: &Pt2) -> Option<Vec3> {
        let n = self.intrinsics.invert(px);
        let rd = (n.x * n.x + n.y * n.y).sqrt();
        if rd < 1e-12 {
            return Some(Vec3::z());
        }
        let theta = self.invert_theta_d(rd);
        let (s, c) = theta.sin_cos();
        Some(Vec3::new(s * n.x / rd, s * n.y / rd, c))
    }

    fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    fn distortion_coeffs(&self) -> Vec<Real> {
        self.k.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn model() -> FisheyeModel {
        FisheyeModel::new(
            Intrinsics::new(400.0, 395.0, 512.0, 384.0),
            [-0.02, 0.005, -0.001, 0.0002],
        )
    }

    #[test]
    fn optical_axis_hits_principal_point() {
        let px = model().project(&Vec3::new(0.0, 0.0, 1.0)).unwrap();
        assert_relative_eq!(px.x, 512.0, epsilon = 1e-9);
        assert_relative_eq!(px.y, 384.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_coefficients_give_equidistant_projection() {
        let m = FisheyeModel::new(Intrinsics::new(400.0, 400.0, 512.0, 384.0), [0.0; 4]);
        // 45 degrees off-axis along x: radius = f * theta.
        let px = m.project(&Vec3::new(1.0, 0.0, 1.0)).unwrap();
        assert_relative_eq!(px.x, 512.0 + 400.0 * std::f64::consts::FRAC_PI_4, epsilon = 1e-9);
        assert_relative_eq!(px.y, 384.0, epsilon = 1e-9);
    }

    #[test]
    fn wide_angles_project_beyond_ninety_degrees() {
        // A point slightly behind the image plane is still imaged.
        let px = model().project(&Vec3::new(1.0, 0.0, -0.1));
        assert!(px.is_some());
    }

    #[test]
    fn project_unproject_round_trip() {
        let m = model();
        let dir = Vec3::new(0.4, -0.3, 1.0).normalize();
        let px = m.project(&dir).unwrap();
        let back = m.unproject(&px).unwrap();
        assert_relative_eq!(back.x, dir.x, epsilon = 1e-9);
        assert_relative_eq!(back.y, dir.y, epsilon = 1e-9);
        assert_relative_eq!(back.z, dir.z, epsilon = 1e-9);
    }
}
