//! Core types and utilities for chessboard camera calibration.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete corner detector, camera model or image type:
//! board geometry, 2D/3D correspondence containers, the calibration report
//! and its on-disk storage, and a minimal logger.

mod board;
mod logger;
mod math;
mod report;
mod storage;
mod view;

pub use board::BoardSpec;
pub use logger::init_with_level;
pub use math::{ImageSize, Iso3, Mat3, Pt2, Pt3, Real, Vec2, Vec3};
pub use report::CalibrationReport;
pub use storage::{read_calibration, write_calibration, StorageError};
pub use view::{CorrespondenceView, ViewError};
