//! Physical chessboard description and object-point generation.

use serde::{Deserialize, Serialize};

use crate::math::{Pt3, Real};

/// Geometry of a planar chessboard calibration target.
///
/// `cols` and `rows` count *inner* corners (black/white intersections),
/// not squares. `spacing` is the physical distance between adjacent
/// corners, in millimeters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardSpec {
    pub cols: u32,
    pub rows: u32,
    pub spacing: Real,
}

impl Default for BoardSpec {
    /// The 7x10 board with 24 mm squares used by the batch pipeline.
    fn default() -> Self {
        Self {
            cols: 7,
            rows: 10,
            spacing: 24.0,
        }
    }
}

impl BoardSpec {
    pub fn new(cols: u32, rows: u32, spacing: Real) -> Self {
        Self {
            cols,
            rows,
            spacing,
        }
    }

    /// Total number of inner corners.
    pub fn corner_count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }

    /// 3D corner coordinates in the board frame, row-major (row outer,
    /// column inner) to match the detector's corner ordering.
    ///
    /// The board lies in the `z = 0` plane: the corner at row `r`,
    /// column `c` is `(spacing * c, spacing * r, 0)`.
    pub fn object_points(&self) -> Vec<Pt3> {
        let mut points = Vec::with_capacity(self.corner_count());
        for r in 0..self.rows {
            for c in 0..self.cols {
                points.push(Pt3::new(
                    self.spacing * Real::from(c),
                    self.spacing * Real::from(r),
                    0.0,
                ));
            }
        }
        points
    }
}
