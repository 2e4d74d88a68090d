//! Camera models for chessboard calibration.
//!
//! Three models share one [`CameraModel`] trait:
//! - [`PinholeModel`]: perspective projection with Brown-Conrady distortion
//!   (k1, k2, p1, p2, k3),
//! - [`FisheyeModel`]: Kannala-Brandt equidistant distortion (k1..k4),
//! - [`OmnidirModel`]: Mei unified model with mirror parameter xi and
//!   radial-tangential distortion (k1, k2, p1, p2).
//!
//! Projection maps a point in *camera coordinates* to pixels; unprojection
//! inverts it back to a ray. [`undistort`] builds dense remap tables from a
//! model and resamples images through them.

mod camera;
mod fisheye;
mod intrinsics;
mod omnidir;
mod pinhole;
pub mod undistort;

pub use camera::CameraModel;
pub use fisheye::FisheyeModel;
pub use intrinsics::Intrinsics;
pub use omnidir::OmnidirModel;
pub use pinhole::{BrownConrady, PinholeModel};
