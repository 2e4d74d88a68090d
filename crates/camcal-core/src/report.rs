//! User-facing calibration result for one camera model.

use serde::{Deserialize, Serialize};

use crate::math::{Mat3, Real};

/// Calibrated parameters of one camera model, as persisted to disk.
///
/// The distortion vector length depends on the model (5 for pinhole
/// Brown-Conrady, 4 for fisheye and omnidirectional). `xi` is the mirror
/// parameter of the omnidirectional model and `None` for the others.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Root-mean-square reprojection error, in pixels.
    pub rms: Real,
    /// 3x3 intrinsic matrix.
    pub k: Mat3,
    /// Model-specific distortion coefficients.
    pub d: Vec<Real>,
    /// Mirror parameter (omnidirectional model only).
    pub xi: Option<Real>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_serializes_to_json() {
        let report = CalibrationReport {
            rms: 0.42,
            k: Mat3::new(800.0, 0.0, 320.0, 0.0, 800.0, 240.0, 0.0, 0.0, 1.0),
            d: vec![0.1, -0.05, 0.0, 0.0, 0.0],
            xi: None,
        };

        let json = serde_json::to_string(&report).unwrap();
        let back: CalibrationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.rms, report.rms);
        assert_eq!(back.k, report.k);
        assert_eq!(back.d, report.d);
        assert_eq!(back.xi, None);
    }
}
