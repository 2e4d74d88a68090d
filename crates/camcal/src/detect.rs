//! Chessboard corner detection for calibration views.
//!
//! Detection itself is delegated to `calib-targets` (chessboard grids on
//! top of ChESS corners from `chess-corners`). This module adapts its
//! output to the calibration convention: a detection is only accepted when
//! the *complete* inner-corner grid was labeled, and the corners are
//! returned in row-major order matching [`BoardSpec::object_points`].

use calib_targets::chessboard::DetectorParams;
use calib_targets::detect::detect_chessboard;
use image::GrayImage;

use camcal_core::{BoardSpec, Pt2, Real};

/// One labeled corner: integer grid coordinates plus pixel position.
#[derive(Clone, Copy, Debug)]
pub(crate) struct GridCorner {
    pub i: i32,
    pub j: i32,
    pub x: Real,
    pub y: Real,
}

/// Detect the chessboard in `img` and return its corners in row-major
/// order, or `None` when no complete board was found.
///
/// The detector labels corners with grid coordinates of arbitrary origin
/// and axis assignment; [`order_row_major`] normalizes them. A board with
/// `rows != cols` keeps the row/column assignment unambiguous up to the
/// usual 180-degree chessboard symmetry, which calibration is insensitive
/// to.
pub fn detect_board(img: &GrayImage, board: &BoardSpec) -> Option<Vec<Pt2>> {
    let params = DetectorParams::default();

    let result = detect_chessboard(img, &params)?;

    let corners: Vec<GridCorner> = result
        .target
        .corners
        .iter()
        .filter_map(|c| {
            c.grid.map(|g| GridCorner {
                i: g.i,
                j: g.j,
                x: Real::from(c.position.x),
                y: Real::from(c.position.y),
            })
        })
        .collect();

    order_row_major(&corners, board)
}

/// Normalize labeled corners to row-major order over a full
/// `board.rows x board.cols` grid.
///
/// Returns `None` unless every cell is labeled exactly once and the grid
/// extents match the board (allowing a row/column swap).
pub(crate) fn order_row_major(corners: &[GridCorner], board: &BoardSpec) -> Option<Vec<Pt2>> {
    if corners.is_empty() {
        return None;
    }

    let i_min = corners.iter().map(|c| c.i).min()?;
    let i_max = corners.iter().map(|c| c.i).max()?;
    let j_min = corners.iter().map(|c| c.j).min()?;
    let j_max = corners.iter().map(|c| c.j).max()?;

    let di = (i_max - i_min + 1) as u32;
    let dj = (j_max - j_min + 1) as u32;

    // Map detector axes onto board rows/columns.
    let (swap, rows, cols) = if di == board.cols && dj == board.rows {
        (false, board.rows, board.cols)
    } else if di == board.rows && dj == board.cols {
        (true, board.rows, board.cols)
    } else {
        return None;
    };

    if corners.len() != board.corner_count() {
        return None;
    }

    let mut grid: Vec<Option<Pt2>> = vec![None; board.corner_count()];
    for c in corners {
        let (row, col) = if swap {
            ((c.i - i_min) as u32, (c.j - j_min) as u32)
        } else {
            ((c.j - j_min) as u32, (c.i - i_min) as u32)
        };
        let idx = (row * cols + col) as usize;
        if grid[idx].is_some() {
            // Duplicate label; reject the detection.
            return None;
        }
        grid[idx] = Some(Pt2::new(c.x, c.y));
    }
    debug_assert_eq!(rows * cols, board.corner_count() as u32);

    grid.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_grid(board: &BoardSpec, swap_axes: bool, offset: (i32, i32)) -> Vec<GridCorner> {
        let mut corners = Vec::new();
        for r in 0..board.rows as i32 {
            for c in 0..board.cols as i32 {
                // Pixel position encodes (row, col) for easy verification.
                let (i, j) = if swap_axes { (r, c) } else { (c, r) };
                corners.push(GridCorner {
                    i: i + offset.0,
                    j: j + offset.1,
                    x: 100.0 + 20.0 * c as Real,
                    y: 50.0 + 20.0 * r as Real,
                });
            }
        }
        corners
    }

    #[test]
    fn orders_complete_grid_row_major() {
        let board = BoardSpec::default();
        let corners = full_grid(&board, false, (0, 0));
        let ordered = order_row_major(&corners, &board).unwrap();

        assert_eq!(ordered.len(), 70);
        assert_eq!(ordered[0], Pt2::new(100.0, 50.0));
        assert_eq!(ordered[1], Pt2::new(120.0, 50.0));
        assert_eq!(ordered[7], Pt2::new(100.0, 70.0));
    }

    #[test]
    fn handles_swapped_axes_and_negative_origins() {
        let board = BoardSpec::default();
        let corners = full_grid(&board, true, (-3, 5));
        let ordered = order_row_major(&corners, &board).unwrap();

        assert_eq!(ordered[0], Pt2::new(100.0, 50.0));
        assert_eq!(ordered[1], Pt2::new(120.0, 50.0));
        assert_eq!(ordered[7], Pt2::new(100.0, 70.0));
    }

    #[test]
    fn incomplete_grid_is_rejected() {
        let board = BoardSpec::default();
        let mut corners = full_grid(&board, false, (0, 0));
        corners.pop();
        assert!(order_row_major(&corners, &board).is_none());
    }

    #[test]
    fn wrong_grid_extent_is_rejected() {
        let board = BoardSpec::default();
        let other = BoardSpec::new(6, 9, 24.0);
        let corners = full_grid(&other, false, (0, 0));
        assert!(order_row_major(&corners, &board).is_none());
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let board = BoardSpec::default();
        let mut corners = full_grid(&board, false, (0, 0));
        let last = *corners.last().unwrap();
        corners[0] = last;
        assert!(order_row_major(&corners, &board).is_none());
    }
}
