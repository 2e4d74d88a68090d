//! Plane-to-image homography estimation.

use nalgebra::DMatrix;
use thiserror::Error;

use camcal_core::{Mat3, Pt2, Real};

#[derive(Debug, Error)]
pub enum HomographyError {
    #[error("need at least 4 point correspondences, got {0}")]
    NotEnoughPoints(usize),
    #[error("svd failed")]
    SvdFailed,
}

/// Estimate `H` such that `image ~ H * plane` using DLT.
pub fn dlt_homography(plane: &[Pt2], image: &[Pt2]) -> Result<Mat3, HomographyError> {
    let n = plane.len();
    if n < 4 || image.len() != n {
        return Err(HomographyError::NotEnoughPoints(n.min(image.len())));
    }

    let mut a = DMatrix::<Real>::zeros(2 * n, 9);

    for (i, (pw, pi)) in plane.iter().zip(image.iter()).enumerate() {
        let x = pw.x;
        let y = pw.y;
        let u = pi.x;
        let v = pi.y;

        let r0 = 2 * i;
        let r1 = 2 * i + 1;

        a[(r0, 0)] = -x;
        a[(r0, 1)] = -y;
        a[(r0, 2)] = -1.0;
        a[(r0, 6)] = u * x;
        a[(r0, 7)] = u * y;
        a[(r0, 8)] = u;

        a[(r1, 3)] = -x;
        a[(r1, 4)] = -y;
        a[(r1, 5)] = -1.0;
        a[(r1, 6)] = v * x;
        a[(r1, 7)] = v * y;
        a[(r1, 8)] = v;
    }

    // Solve A h = 0 via SVD (smallest singular value).
    let svd = a.svd(false, true);
    let v_t = svd.v_t.ok_or(HomographyError::SvdFailed)?;
    let h = v_t.row(v_t.nrows() - 1);

    let mut h_mat = Mat3::zeros();
    for r in 0..3 {
        for c in 0..3 {
            h_mat[(r, c)] = h[3 * r + c];
        }
    }

    // Normalize such that H[2,2] = 1.
    let scale = h_mat[(2, 2)];
    if scale.abs() > Real::EPSILON {
        h_mat /= scale;
    }

    Ok(h_mat)
}

/// Apply a homography to a plane point.
pub(crate) fn apply_homography(h: &Mat3, p: &Pt2) -> Pt2 {
    let q = h * nalgebra::Vector3::new(p.x, p.y, 1.0);
    Pt2::new(q.x / q.z, q.y / q.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn recovers_pure_scaling() {
        let plane = vec![
            Pt2::new(0.0, 0.0),
            Pt2::new(1.0, 0.0),
            Pt2::new(1.0, 1.0),
            Pt2::new(0.0, 1.0),
        ];
        let image = vec![
            Pt2::new(0.0, 0.0),
            Pt2::new(2.0, 0.0),
            Pt2::new(2.0, 2.0),
            Pt2::new(0.0, 2.0),
        ];

        let h = dlt_homography(&plane, &image).unwrap();
        assert_relative_eq!(h[(0, 0)], 2.0, epsilon = 1e-9);
        assert_relative_eq!(h[(1, 1)], 2.0, epsilon = 1e-9);
    }

    #[test]
    fn recovers_projective_warp_on_grid() {
        // Ground-truth projective transform applied to a board-scale grid.
        let h_gt = Mat3::new(
            1.7, 0.1, 300.0, -0.05, 1.65, 220.0, 1e-4, -2e-4, 1.0,
        );

        let mut plane = Vec::new();
        let mut image = Vec::new();
        for r in 0..6 {
            for c in 0..8 {
                let p = Pt2::new(24.0 * c as Real, 24.0 * r as Real);
                image.push(apply_homography(&h_gt, &p));
                plane.push(p);
            }
        }

        let h = dlt_homography(&plane, &image).unwrap();
        for (p, expected) in plane.iter().zip(image.iter()) {
            let q = apply_homography(&h, p);
            assert_relative_eq!(q.x, expected.x, epsilon = 1e-6);
            assert_relative_eq!(q.y, expected.y, epsilon = 1e-6);
        }
    }

    #[test]
    fn too_few_points_is_an_error() {
        let pts = vec![Pt2::new(0.0, 0.0); 3];
        assert!(matches!(
            dlt_homography(&pts, &pts),
            Err(HomographyError::NotEnoughPoints(3))
        ));
    }
}
