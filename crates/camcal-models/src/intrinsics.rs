//! Pinhole intrinsic parameters shared by all camera models.

use serde::{Deserialize, Serialize};

use camcal_core::{Mat3, Pt2, Real, Vec2};

/// Focal lengths, principal point and skew.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: Real,
    pub fy: Real,
    pub cx: Real,
    pub cy: Real,
    pub skew: Real,
}

impl Intrinsics {
    pub fn new(fx: Real, fy: Real, cx: Real, cy: Real) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            skew: 0.0,
        }
    }

    /// The 3x3 camera matrix `K`.
    pub fn k_matrix(&self) -> Mat3 {
        Mat3::new(
            self.fx, self.skew, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0,
        )
    }

    /// Read fx, fy, cx, cy and skew back from a camera matrix.
    pub fn from_k_matrix(k: &Mat3) -> Self {
        Self {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
            skew: k[(0, 1)],
        }
    }

    /// Apply `K` to normalized image coordinates.
    pub fn apply(&self, xd: Real, yd: Real) -> Pt2 {
        Pt2::new(
            self.fx * xd + self.skew * yd + self.cx,
            self.fy * yd + self.cy,
        )
    }

    /// Invert `K` for a pixel, producing normalized (distorted) coordinates.
    pub fn invert(&self, px: &Pt2) -> Vec2 {
        let y = (px.y - self.cy) / self.fy;
        let x = (px.x - self.cx - self.skew * y) / self.fx;
        Vec2::new(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn k_matrix_round_trip() {
        let intr = Intrinsics {
            fx: 812.0,
            fy: 809.5,
            cx: 320.25,
            cy: 241.0,
            skew: 0.3,
        };
        assert_eq!(Intrinsics::from_k_matrix(&intr.k_matrix()), intr);
    }

    #[test]
    fn apply_and_invert_are_inverse() {
        let intr = Intrinsics {
            fx: 800.0,
            fy: 780.0,
            cx: 640.0,
            cy: 360.0,
            skew: 1.5,
        };
        let px = intr.apply(0.12, -0.34);
        let n = intr.invert(&px);
        assert_relative_eq!(n.x, 0.12, epsilon = 1e-12);
        assert_relative_eq!(n.y, -0.34, epsilon = 1e-12);
    }
}
