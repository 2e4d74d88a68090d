//! Pose initialization from a plane-induced homography.

use nalgebra::{Matrix3, Rotation3, Translation3, UnitQuaternion, Vector3};

use camcal_core::{Iso3, Mat3, Real};

use crate::zhang::ZhangError;

/// Decompose a homography `H = K [r1 r2 t]` into the pose of a planar board
/// (its own `Z = 0` plane) relative to the camera.
///
/// The rotation is re-orthogonalized by polar decomposition, so the result
/// tolerates the noise of a DLT estimate.
pub fn pose_from_homography(kmtx: &Mat3, hmtx: &Mat3) -> Result<Iso3, ZhangError> {
    let k_inv = kmtx.try_inverse().ok_or(ZhangError::Degenerate)?;

    let h1 = hmtx.column(0);
    let h2 = hmtx.column(1);
    let h3 = hmtx.column(2).into_owned();

    let k_inv_h1 = k_inv * h1;
    let k_inv_h2 = k_inv * h2;

    // Scale: normalize the first two columns (averaged for robustness).
    let norm1 = k_inv_h1.norm();
    let norm2 = k_inv_h2.norm();
    if norm1 < Real::EPSILON || norm2 < Real::EPSILON {
        return Err(ZhangError::Degenerate);
    }
    let lambda = 1.0 / ((norm1 + norm2) * 0.5);

    let r1 = (lambda * k_inv_h1).into_owned();
    let r2 = (lambda * k_inv_h2).into_owned();
    let r3 = r1.cross(&r2);

    let mut r_mat = Matrix3::<Real>::zeros();
    r_mat.set_column(0, &r1);
    r_mat.set_column(1, &r2);
    r_mat.set_column(2, &r3);

    // Project onto SO(3) (polar decomposition via SVD).
    let svd = r_mat.svd(true, true);
    let u = svd.u.ok_or(ZhangError::SvdFailed)?;
    let v_t = svd.v_t.ok_or(ZhangError::SvdFailed)?;
    let mut r_orth = u * v_t;
    if r_orth.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r_orth = u_flipped * v_t;
    }

    let t_vec: Vector3<Real> = lambda * (k_inv * h3);
    let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r_orth));
    Ok(Iso3::from_parts(Translation3::from(t_vec), rot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camcal_models::Intrinsics;
    use nalgebra::Isometry3;

    #[test]
    fn recovers_pose_from_synthetic_homography() {
        let kmtx = Intrinsics::new(800.0, 780.0, 640.0, 360.0).k_matrix();

        let rot = Rotation3::from_euler_angles(0.1, -0.05, 0.2);
        let t = Vector3::new(0.1, -0.05, 1.0);
        let iso_gt = Isometry3::from_parts(Translation3::from(t), rot.into());

        let r_binding = iso_gt.rotation.to_rotation_matrix();
        let r_mat = r_binding.matrix();
        let mut hmtx = Mat3::zeros();
        hmtx.set_column(0, &(kmtx * r_mat.column(0)));
        hmtx.set_column(1, &(kmtx * r_mat.column(1)));
        hmtx.set_column(2, &(kmtx * iso_gt.translation.vector));

        let iso_est = pose_from_homography(&kmtx, &hmtx).unwrap();

        assert!((iso_est.translation.vector - iso_gt.translation.vector).norm() < 1e-3);

        let r_est_binding = iso_est.rotation.to_rotation_matrix();
        let r_diff = r_est_binding.matrix().transpose() * r_mat;
        let angle = ((r_diff.trace() - 1.0) * 0.5).clamp(-1.0, 1.0).acos();
        assert!(angle < 1e-3, "rotation error too large: {angle}");
    }

    #[test]
    fn singular_k_is_rejected() {
        assert!(pose_from_homography(&Mat3::zeros(), &Mat3::identity()).is_err());
    }
}
