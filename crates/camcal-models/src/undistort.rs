//! Image undistortion: dense remap tables plus bilinear resampling.
//!
//! For every destination pixel the table stores the source position that a
//! rectified (ideal pinhole, intrinsics `Knew`) camera would observe there:
//! `src = model.project(Knew^-1 * [u, v, 1])`. Destination pixels whose ray
//! the model cannot image are marked invalid and render black.

use image::{Rgb, RgbImage};
use thiserror::Error;

use camcal_core::{ImageSize, Mat3, Pt2, Real, Vec3};

use crate::camera::CameraModel;

#[derive(Debug, Error)]
pub enum UndistortError {
    #[error("rectified camera matrix is not invertible")]
    SingularKnew,
}

/// Precomputed per-pixel source coordinates for one model and `Knew`.
pub struct RemapTable {
    width: u32,
    height: u32,
    /// Source x per destination pixel; NaN marks unmappable pixels.
    map_x: Vec<f32>,
    map_y: Vec<f32>,
}

impl RemapTable {
    /// Build the table for a destination image of `size` pixels.
    pub fn build<M: CameraModel>(
        model: &M,
        knew: &Mat3,
        size: ImageSize,
    ) -> Result<Self, UndistortError> {
        let knew_inv = knew.try_inverse().ok_or(UndistortError::SingularKnew)?;

        let n = size.width as usize * size.height as usize;
        let mut map_x = vec![f32::NAN; n];
        let mut map_y = vec![f32::NAN; n];

        for v in 0..size.height {
            for u in 0..size.width {
                let ray = knew_inv * Vec3::new(Real::from(u), Real::from(v), 1.0);
                if let Some(src) = model.project(&ray) {
                    let idx = (v * size.width + u) as usize;
                    map_x[idx] = src.x as f32;
                    map_y[idx] = src.y as f32;
                }
            }
        }

        Ok(Self {
            width: size.width,
            height: size.height,
            map_x,
            map_y,
        })
    }

    /// Source position for destination pixel `(u, v)`, if mappable.
    pub fn lookup(&self, u: u32, v: u32) -> Option<Pt2> {
        let idx = (v * self.width + u) as usize;
        let x = self.map_x[idx];
        if x.is_nan() {
            return None;
        }
        Some(Pt2::new(Real::from(x), Real::from(self.map_y[idx])))
    }
}

/// Resample `src` through the table. Unmappable or out-of-range pixels are
/// black.
pub fn remap(src: &RgbImage, table: &RemapTable) -> RgbImage {
    let mut out = RgbImage::new(table.width, table.height);
    for v in 0..table.height {
        for u in 0..table.width {
            let px = match table.lookup(u, v) {
                Some(p) => sample_bilinear(src, p.x, p.y),
                None => Rgb([0, 0, 0]),
            };
            out.put_pixel(u, v, px);
        }
    }
    out
}

/// Undistort `src` with `model`, rectifying to the pinhole camera `knew`.
pub fn undistort_image<M: CameraModel>(
    src: &RgbImage,
    model: &M,
    knew: &Mat3,
) -> Result<RgbImage, UndistortError> {
    let size = ImageSize::new(src.width(), src.height());
    let table = RemapTable::build(model, knew, size)?;
    Ok(remap(src, &table))
}

/// The `cv::omnidir` perspective-rectification convention for `Knew`:
/// focal `w/4`, `h/4` with the principal point at the image center.
pub fn perspective_knew(size: ImageSize) -> Mat3 {
    let w = Real::from(size.width);
    let h = Real::from(size.height);
    Mat3::new(w / 4.0, 0.0, w / 2.0, 0.0, h / 4.0, h / 2.0, 0.0, 0.0, 1.0)
}

fn sample_bilinear(img: &RgbImage, x: Real, y: Real) -> Rgb<u8> {
    // Range-check in floating point: a cast would saturate huge mapped
    // coordinates and wrap the neighbor index past the image edge.
    if x < 0.0
        || y < 0.0
        || x + 1.0 >= Real::from(img.width())
        || y + 1.0 >= Real::from(img.height())
    {
        return Rgb([0, 0, 0]);
    }
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let fx = x - Real::from(x0);
    let fy = y - Real::from(y0);

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x0 + 1, y0);
    let p01 = img.get_pixel(x0, y0 + 1);
    let p11 = img.get_pixel(x0 + 1, y0 + 1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = Real::from(p00[c]) * (1.0 - fx) + Real::from(p10[c]) * fx;
        let bottom = Real::from(p01[c]) * (1.0 - fx) + Real::from(p11[c]) * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}
