//! The batch calibration pipeline.
//!
//! One run walks a directory of chessboard photographs, detects corners in
//! each, calibrates the pinhole, fisheye and omnidirectional models on the
//! views where detection succeeded, writes one XML result file per model
//! and undistorts a sample photograph through each calibrated model.

use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;

use camcal_core::{write_calibration, BoardSpec, CalibrationReport, ImageSize, StorageError};
use camcal_models::undistort::{perspective_knew, undistort_image, UndistortError};
use camcal_solve::{
    calibrate_fisheye, calibrate_omnidir, calibrate_pinhole, CalibrateError, SolveOptions,
};

use crate::detect::detect_board;
use crate::list::{list_images, ListError};
use crate::session::{CalibrationSession, SessionError};

/// Result file names, fixed by the downstream consumers of this pipeline.
pub const PINHOLE_RESULT: &str = "perspectiveCalibrate.xml";
pub const FISHEYE_RESULT: &str = "fisheyeCalibrate.xml";
pub const OMNIDIR_RESULT: &str = "omnidirectionalCalibrate.xml";

pub const PINHOLE_UNDISTORT: &str = "undistort.jpg";
pub const FISHEYE_UNDISTORT: &str = "undistort_fisheye.jpg";
pub const OMNIDIR_UNDISTORT: &str = "undistort_omnidir.jpg";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    List(#[from] ListError),

    #[error("no *{ext} images found in {dir}")]
    NoImages { dir: PathBuf, ext: String },

    #[error("cannot load {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot save {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("{model} calibration failed: {source}")]
    Calibrate {
        model: &'static str,
        #[source]
        source: CalibrateError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Undistort(#[from] UndistortError),
}

/// Inputs of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding the calibration images.
    pub img_dir: PathBuf,
    /// File-name suffix selecting calibration images, e.g. `.jpg`.
    pub ext: String,
    /// Sample photograph to undistort with each calibrated model.
    pub photo: PathBuf,
    /// Directory receiving the XML results and undistorted images.
    pub out_dir: PathBuf,
    pub board: BoardSpec,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            img_dir: PathBuf::from("./img"),
            ext: ".jpg".into(),
            photo: PathBuf::from("./photo.jpg"),
            out_dir: PathBuf::from("."),
            board: BoardSpec::default(),
        }
    }
}

/// What one run produced.
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub images: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub pinhole: CalibrationReport,
    pub fisheye: CalibrationReport,
    pub omnidir: CalibrationReport,
}

impl std::fmt::Display for PipelineSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} images, {} with detected boards, {} skipped",
            self.images, self.succeeded, self.skipped
        )?;
        writeln!(f, "perspective      rms = {:.4} px", self.pinhole.rms)?;
        writeln!(f, "fisheye          rms = {:.4} px", self.fisheye.rms)?;
        write!(f, "omnidirectional  rms = {:.4} px", self.omnidir.rms)
    }
}

/// Run the full pipeline.
pub fn run(config: &PipelineConfig) -> Result<PipelineSummary, PipelineError> {
    let paths = list_images(&config.img_dir, &config.ext)?;
    if paths.is_empty() {
        return Err(PipelineError::NoImages {
            dir: config.img_dir.clone(),
            ext: config.ext.clone(),
        });
    }
    log::info!("{} calibration images in {}", paths.len(), config.img_dir.display());

    let mut session = CalibrationSession::new(config.board);
    for path in &paths {
        let img = image::open(path)
            .map_err(|source| PipelineError::Image {
                path: path.clone(),
                source,
            })?
            .to_luma8();
        let size = ImageSize::new(img.width(), img.height());
        let corners = detect_board(&img, &config.board);
        session.add_detection(path, size, corners)?;
    }

    // The first image fixed the size, and paths is non-empty.
    let size = session.image_size().ok_or(PipelineError::NoImages {
        dir: config.img_dir.clone(),
        ext: config.ext.clone(),
    })?;

    let photo = image::open(&config.photo)
        .map_err(|source| PipelineError::Image {
            path: config.photo.clone(),
            source,
        })?
        .to_rgb8();

    let (pinhole, fisheye, omnidir) = calibrate_and_write(&session, size, &photo, &config.out_dir)?;

    Ok(PipelineSummary {
        images: paths.len(),
        succeeded: session.succeeded(),
        skipped: session.skipped(),
        pinhole,
        fisheye,
        omnidir,
    })
}

/// Post-detection stages: calibrate all three models on the session's views,
/// write one XML result file per model and undistort `photo` through each,
/// saving three JPEGs into `out_dir`.
fn calibrate_and_write(
    session: &CalibrationSession,
    size: ImageSize,
    photo: &RgbImage,
    out_dir: &Path,
) -> Result<(CalibrationReport, CalibrationReport, CalibrationReport), PipelineError> {
    let pinhole = calibrate_pinhole(session.views(), size, &SolveOptions::default())
        .map_err(|source| PipelineError::Calibrate {
            model: "perspective",
            source,
        })?;
    let fisheye = calibrate_fisheye(session.views(), size, &SolveOptions::default())
        .map_err(|source| PipelineError::Calibrate {
            model: "fisheye",
            source,
        })?;
    let omnidir = calibrate_omnidir(session.views(), size, &SolveOptions::omnidir())
        .map_err(|source| PipelineError::Calibrate {
            model: "omnidirectional",
            source,
        })?;

    let pinhole_report = pinhole.to_report();
    let fisheye_report = fisheye.to_report();
    let omnidir_report = omnidir.to_report();

    write_calibration(&out_dir.join(PINHOLE_RESULT), &pinhole_report)?;
    write_calibration(&out_dir.join(FISHEYE_RESULT), &fisheye_report)?;
    write_calibration(&out_dir.join(OMNIDIR_RESULT), &omnidir_report)?;

    let photo_size = ImageSize::new(photo.width(), photo.height());

    // Pinhole and fisheye rectify onto their own K; the omnidirectional
    // model needs the wider perspective Knew to keep the scene in frame.
    let out = undistort_image(photo, &pinhole.model, &pinhole.model.intrinsics.k_matrix())?;
    save_image(&out, &out_dir.join(PINHOLE_UNDISTORT))?;

    let out = undistort_image(photo, &fisheye.model, &fisheye.model.intrinsics.k_matrix())?;
    save_image(&out, &out_dir.join(FISHEYE_UNDISTORT))?;

    let out = undistort_image(photo, &omnidir.model, &perspective_knew(photo_size))?;
    save_image(&out, &out_dir.join(OMNIDIR_UNDISTORT))?;

    Ok((pinhole_report, fisheye_report, omnidir_report))
}

fn save_image(img: &RgbImage, path: &Path) -> Result<(), PipelineError> {
    img.save(path).map_err(|source| PipelineError::Save {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    use image::Rgb;
    use nalgebra::{Translation3, UnitQuaternion};

    use camcal_core::{read_calibration, Iso3, Pt2};
    use camcal_models::{BrownConrady, CameraModel, Intrinsics, PinholeModel};

    fn synthetic_session() -> CalibrationSession {
        let board = BoardSpec::default();
        let model = PinholeModel::new(
            Intrinsics::new(820.0, 810.0, 640.0, 480.0),
            BrownConrady::default(),
        );
        let poses = [
            (0.1, 0.0, 0.05, 20.0, -10.0, 500.0),
            (-0.15, 0.2, -0.1, -30.0, 15.0, 550.0),
            (0.2, -0.1, 0.0, 0.0, 0.0, 450.0),
            (0.0, 0.25, 0.1, 25.0, 20.0, 600.0),
            (-0.2, -0.15, 0.05, -15.0, -25.0, 520.0),
            (0.12, 0.18, -0.08, 10.0, 5.0, 480.0),
        ];

        let mut session = CalibrationSession::new(board);
        for (i, &(rx, ry, rz, tx, ty, tz)) in poses.iter().enumerate() {
            let pose = Iso3::from_parts(
                Translation3::new(tx, ty, tz),
                UnitQuaternion::from_euler_angles(rx, ry, rz),
            );
            let corners: Vec<Pt2> = board
                .object_points()
                .iter()
                .map(|p| {
                    let p_cam = pose.transform_point(p);
                    model.project(&p_cam.coords).expect("board in view")
                })
                .collect();
            let name = format!("img/{i:02}.jpg");
            session
                .add_detection(Path::new(&name), ImageSize::new(1280, 960), Some(corners))
                .unwrap();
        }
        session
    }

    #[test]
    fn writes_three_results_and_three_undistorted_images() {
        let session = synthetic_session();
        let photo = RgbImage::from_fn(64, 48, |x, y| Rgb([x as u8, y as u8, 0]));
        let dir = tempfile::tempdir().unwrap();

        calibrate_and_write(&session, ImageSize::new(1280, 960), &photo, dir.path()).unwrap();

        for name in [PINHOLE_RESULT, FISHEYE_RESULT, OMNIDIR_RESULT] {
            let report = read_calibration(&dir.path().join(name)).unwrap();
            assert!(report.rms.is_finite(), "{name}: rms = {}", report.rms);
        }
        for name in [PINHOLE_UNDISTORT, FISHEYE_UNDISTORT, OMNIDIR_UNDISTORT] {
            let meta = std::fs::metadata(dir.path().join(name)).unwrap();
            assert!(meta.len() > 0, "{name} is empty");
        }

        // Xi is written for the omnidirectional model only.
        let omnidir = read_calibration(&dir.path().join(OMNIDIR_RESULT)).unwrap();
        assert!(omnidir.xi.is_some());
        let pinhole = read_calibration(&dir.path().join(PINHOLE_RESULT)).unwrap();
        assert!(pinhole.xi.is_none());
        assert_eq!(pinhole.d.len(), 5);
    }

    #[test]
    fn missing_image_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            img_dir: dir.path().join("nope"),
            out_dir: dir.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        assert!(matches!(run(&config), Err(PipelineError::List(_))));
    }

    #[test]
    fn empty_image_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            img_dir: dir.path().to_path_buf(),
            out_dir: dir.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        assert!(matches!(run(&config), Err(PipelineError::NoImages { .. })));
    }

    #[test]
    fn unreadable_image_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("junk.jpg")).unwrap();
        let config = PipelineConfig {
            img_dir: dir.path().to_path_buf(),
            out_dir: dir.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        assert!(matches!(run(&config), Err(PipelineError::Image { .. })));
    }
}
