//! Calibration solvers for the three camcal camera models.
//!
//! Each `calibrate_*` entry point follows the same two-stage scheme:
//! 1. linear initialization — DLT homography per view, Zhang's closed-form
//!    intrinsics, planar pose decomposition,
//! 2. joint Levenberg-Marquardt refinement of the shared camera parameters
//!    and the per-view 6-DoF poses over all reprojection residuals.

mod calibrate;
mod homography;
mod planar_pose;
mod problem;
mod zhang;

pub use calibrate::{
    calibrate_fisheye, calibrate_omnidir, calibrate_pinhole, CalibrateError, FisheyeCalibration,
    OmnidirCalibration, PinholeCalibration, MIN_VIEWS,
};
pub use homography::{dlt_homography, HomographyError};
pub use planar_pose::pose_from_homography;
pub use problem::{SolveOptions, SolveReport};
pub use zhang::{intrinsics_from_homographies, ZhangError};
