//! The three calibration engines: pinhole, fisheye, omnidirectional.

use nalgebra::{DVector, Rotation3, Translation3, UnitQuaternion};
use thiserror::Error;

use camcal_core::{
    CalibrationReport, CorrespondenceView, ImageSize, Iso3, Pt2, Real, Vec3,
};
use camcal_models::{
    BrownConrady, CameraModel, FisheyeModel, Intrinsics, OmnidirModel, PinholeModel,
};

use crate::homography::{dlt_homography, HomographyError};
use crate::planar_pose::pose_from_homography;
use crate::problem::{solve_bundle, BundleCamera, BundleProblem, SolveOptions, SolveReport};
use crate::zhang::{intrinsics_from_homographies, ZhangError};

/// Minimum number of views with successful detection.
pub const MIN_VIEWS: usize = 3;

#[derive(Debug, Error)]
pub enum CalibrateError {
    #[error("need at least {MIN_VIEWS} views with successful detection, got {0}")]
    NotEnoughViews(usize),

    #[error(transparent)]
    Homography(#[from] HomographyError),

    #[error(transparent)]
    LinearInit(#[from] ZhangError),

    #[error("bundle refinement failed: {0}")]
    Solver(String),
}

/// Linear initialization shared by all three engines.
struct LinearInit {
    intrinsics: Intrinsics,
    /// Per-view `[rvec, tvec]` in bundle layout.
    poses: Vec<[Real; 6]>,
}

fn linear_init(
    views: &[CorrespondenceView],
    size: ImageSize,
) -> Result<LinearInit, CalibrateError> {
    if views.len() < MIN_VIEWS {
        return Err(CalibrateError::NotEnoughViews(views.len()));
    }

    let mut homographies = Vec::with_capacity(views.len());
    for view in views {
        let plane: Vec<Pt2> = view
            .object_points()
            .iter()
            .map(|p| Pt2::new(p.x, p.y))
            .collect();
        homographies.push(dlt_homography(&plane, view.image_points())?);
    }

    let mut intrinsics = intrinsics_from_homographies(&homographies)?;
    // The engines estimate skew separately (fixed at zero or as a free
    // bundle parameter); the closed-form value is mostly noise.
    intrinsics.skew = 0.0;
    let intrinsics = seed_principal_point(intrinsics, size);
    let kmtx = intrinsics.k_matrix();

    let mut poses = Vec::with_capacity(views.len());
    for h in &homographies {
        let iso = pose_from_homography(&kmtx, h)?;
        poses.push(pose_to_params(&iso));
    }

    Ok(LinearInit { intrinsics, poses })
}

/// On noisy input Zhang's closed form can place the principal point far off
/// the sensor; re-seed it at the image center, as OpenCV's initializers do.
fn seed_principal_point(mut intrinsics: Intrinsics, size: ImageSize) -> Intrinsics {
    let w = Real::from(size.width);
    let h = Real::from(size.height);
    if !(0.0..w).contains(&intrinsics.cx) || !(0.0..h).contains(&intrinsics.cy) {
        intrinsics.cx = w / 2.0;
        intrinsics.cy = h / 2.0;
    }
    intrinsics
}

fn pose_to_params(iso: &Iso3) -> [Real; 6] {
    let rvec = iso.rotation.scaled_axis();
    let t = iso.translation.vector;
    [rvec.x, rvec.y, rvec.z, t.x, t.y, t.z]
}

fn params_to_pose(p: &[Real]) -> Iso3 {
    let rot = Rotation3::from_scaled_axis(Vec3::new(p[0], p[1], p[2]));
    Iso3::from_parts(
        Translation3::new(p[3], p[4], p[5]),
        UnitQuaternion::from_rotation_matrix(&rot),
    )
}

fn pack_params(cam: &[Real], poses: &[[Real; 6]]) -> DVector<Real> {
    let mut x = DVector::zeros(cam.len() + 6 * poses.len());
    x.as_mut_slice()[..cam.len()].copy_from_slice(cam);
    for (i, pose) in poses.iter().enumerate() {
        x.as_mut_slice()[cam.len() + 6 * i..cam.len() + 6 * (i + 1)].copy_from_slice(pose);
    }
    x
}

fn unpack_poses(x: &DVector<Real>, cam_dim: usize, num_views: usize) -> Vec<Iso3> {
    (0..num_views)
        .map(|i| params_to_pose(&x.as_slice()[cam_dim + 6 * i..cam_dim + 6 * (i + 1)]))
        .collect()
}

// ---------------------------------------------------------------------------
// Pinhole
// ---------------------------------------------------------------------------

/// Bundle layout: `[fx, fy, cx, cy, k1, k2, p1, p2, k3]`.
struct PinholeBundle;

impl BundleCamera for PinholeBundle {
    const CAM_DIM: usize = 9;

    fn project_with(cam: &[Real], p: &Vec3) -> Option<Pt2> {
        let model = PinholeModel::new(
            Intrinsics::new(cam[0], cam[1], cam[2], cam[3]),
            BrownConrady {
                k1: cam[4],
                k2: cam[5],
                p1: cam[6],
                p2: cam[7],
                k3: cam[8],
            },
        );
        model.project(p)
    }
}

/// Result of the perspective calibration.
#[derive(Debug, Clone)]
pub struct PinholeCalibration {
    pub model: PinholeModel,
    pub rms: Real,
    pub poses: Vec<Iso3>,
    pub report: SolveReport,
}

impl PinholeCalibration {
    pub fn to_report(&self) -> CalibrationReport {
        CalibrationReport {
            rms: self.rms,
            k: self.model.intrinsics.k_matrix(),
            d: self.model.distortion_coeffs(),
            xi: None,
        }
    }
}

/// Calibrate the perspective model (`cv::calibrateCamera` counterpart).
pub fn calibrate_pinhole(
    views: &[CorrespondenceView],
    image_size: ImageSize,
    opts: &SolveOptions,
) -> Result<PinholeCalibration, CalibrateError> {
    let init = linear_init(views, image_size)?;
    let i = init.intrinsics;
    let cam0 = [i.fx, i.fy, i.cx, i.cy, 0.0, 0.0, 0.0, 0.0, 0.0];

    let problem = BundleProblem::<PinholeBundle>::new(views, pack_params(&cam0, &init.poses));
    let (problem, report) = solve_bundle(problem, opts).map_err(CalibrateError::Solver)?;

    let rms = problem.rms();
    let x = problem.into_params();
    let poses = unpack_poses(&x, PinholeBundle::CAM_DIM, views.len());
    let model = PinholeModel::new(
        Intrinsics::new(x[0], x[1], x[2], x[3]),
        BrownConrady {
            k1: x[4],
            k2: x[5],
            p1: x[6],
            p2: x[7],
            k3: x[8],
        },
    );

    log::info!("pinhole calibration: rms = {rms:.4} px over {} views", views.len());
    Ok(PinholeCalibration {
        model,
        rms,
        poses,
        report,
    })
}

// ---------------------------------------------------------------------------
// Fisheye
// ---------------------------------------------------------------------------

/// Bundle layout: `[fx, fy, cx, cy, k1, k2, k3, k4]`.
struct FisheyeBundle;

impl BundleCamera for FisheyeBundle {
    const CAM_DIM: usize = 8;

    fn project_with(cam: &[Real], p: &Vec3) -> Option<Pt2> {
        let model = FisheyeModel::new(
            Intrinsics::new(cam[0], cam[1], cam[2], cam[3]),
            [cam[4], cam[5], cam[6], cam[7]],
        );
        model.project(p)
    }
}

#[derive(Debug, Clone)]
pub struct FisheyeCalibration {
    pub model: FisheyeModel,
    pub rms: Real,
    pub poses: Vec<Iso3>,
    pub report: SolveReport,
}

impl FisheyeCalibration {
    pub fn to_report(&self) -> CalibrationReport {
        CalibrationReport {
            rms: self.rms,
            k: self.model.intrinsics.k_matrix(),
            d: self.model.distortion_coeffs(),
            xi: None,
        }
    }
}

/// Calibrate the fisheye model (`cv::fisheye::calibrate` counterpart with
/// skew fixed at zero).
pub fn calibrate_fisheye(
    views: &[CorrespondenceView],
    image_size: ImageSize,
    opts: &SolveOptions,
) -> Result<FisheyeCalibration, CalibrateError> {
    let init = linear_init(views, image_size)?;
    let i = init.intrinsics;
    let cam0 = [i.fx, i.fy, i.cx, i.cy, 0.0, 0.0, 0.0, 0.0];

    let problem = BundleProblem::<FisheyeBundle>::new(views, pack_params(&cam0, &init.poses));
    let (problem, report) = solve_bundle(problem, opts).map_err(CalibrateError::Solver)?;

    let rms = problem.rms();
    let x = problem.into_params();
    let poses = unpack_poses(&x, FisheyeBundle::CAM_DIM, views.len());
    let model = FisheyeModel::new(
        Intrinsics::new(x[0], x[1], x[2], x[3]),
        [x[4], x[5], x[6], x[7]],
    );

    log::info!("fisheye calibration: rms = {rms:.4} px over {} views", views.len());
    Ok(FisheyeCalibration {
        model,
        rms,
        poses,
        report,
    })
}

// ---------------------------------------------------------------------------
// Omnidirectional
// ---------------------------------------------------------------------------

/// Bundle layout: `[fx, fy, cx, cy, skew, xi, k1, k2, p1, p2]`.
struct OmnidirBundle;

impl BundleCamera for OmnidirBundle {
    const CAM_DIM: usize = 10;

    fn project_with(cam: &[Real], p: &Vec3) -> Option<Pt2> {
        let mut intr = Intrinsics::new(cam[0], cam[1], cam[2], cam[3]);
        intr.skew = cam[4];
        let model = OmnidirModel::new(intr, cam[5], [cam[6], cam[7], cam[8], cam[9]]);
        model.project(p)
    }
}

#[derive(Debug, Clone)]
pub struct OmnidirCalibration {
    pub model: OmnidirModel,
    pub rms: Real,
    pub poses: Vec<Iso3>,
    pub report: SolveReport,
}

impl OmnidirCalibration {
    pub fn to_report(&self) -> CalibrationReport {
        CalibrationReport {
            rms: self.rms,
            k: self.model.intrinsics.k_matrix(),
            d: self.model.distortion_coeffs(),
            xi: Some(self.model.xi),
        }
    }
}

/// Mirror-parameter seeds scanned during omnidirectional initialization.
const XI_SEEDS: [Real; 4] = [0.25, 0.5, 1.0, 2.0];

/// Calibrate the omnidirectional model (`cv::omnidir::calibrate`
/// counterpart, all parameters free).
///
/// Zhang's closed form assumes a perspective projection, for which the Mei
/// model's effective focal length near the image center is `f / (1 + xi)`.
/// The initializer therefore scans a few xi seeds, scales the focal
/// estimate accordingly and keeps the seed with the lowest initial cost
/// before running the full refinement.
pub fn calibrate_omnidir(
    views: &[CorrespondenceView],
    image_size: ImageSize,
    opts: &SolveOptions,
) -> Result<OmnidirCalibration, CalibrateError> {
    let init = linear_init(views, image_size)?;
    let i = init.intrinsics;

    let mut best: Option<(Real, DVector<Real>)> = None;
    for xi in XI_SEEDS {
        let scale = 1.0 + xi;
        let cam0 = [
            i.fx * scale,
            i.fy * scale,
            i.cx,
            i.cy,
            0.0,
            xi,
            0.0,
            0.0,
            0.0,
            0.0,
        ];
        let x0 = pack_params(&cam0, &init.poses);
        let probe = BundleProblem::<OmnidirBundle>::new(views, x0.clone());
        let cost = probe.rms();
        log::debug!("omnidir seed xi = {xi}: initial rms = {cost:.3} px");
        if best.as_ref().map_or(true, |(c, _)| cost < *c) {
            best = Some((cost, x0));
        }
    }
    // XI_SEEDS is non-empty, so a best seed always exists.
    let (_, x0) = best.expect("xi seed scan produced no candidate");

    let problem = BundleProblem::<OmnidirBundle>::new(views, x0);
    let (problem, report) = solve_bundle(problem, opts).map_err(CalibrateError::Solver)?;

    let rms = problem.rms();
    let x = problem.into_params();
    let poses = unpack_poses(&x, OmnidirBundle::CAM_DIM, views.len());
    let mut intr = Intrinsics::new(x[0], x[1], x[2], x[3]);
    intr.skew = x[4];
    let model = OmnidirModel::new(intr, x[5], [x[6], x[7], x[8], x[9]]);

    log::info!(
        "omnidirectional calibration: rms = {rms:.4} px, xi = {:.4} over {} views",
        model.xi,
        views.len()
    );
    Ok(OmnidirCalibration {
        model,
        rms,
        poses,
        report,
    })
}
