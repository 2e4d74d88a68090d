//! Main entry point crate for the camcal calibration pipeline.
//!
//! Ties the workspace together: image listing, chessboard detection (via
//! `calib-targets` on top of ChESS corners), the per-run calibration
//! session, and the batch pipeline that calibrates all three camera models
//! and writes their results and undistorted sample images.

pub mod detect;
pub mod list;
pub mod pipeline;
pub mod session;

pub use camcal_core as core;
pub use camcal_models as models;
pub use camcal_solve as solve;
