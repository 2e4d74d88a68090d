//! Per-run accumulation of calibration views.
//!
//! All intermediate state of one calibration run lives in an explicit
//! session value passed between pipeline stages: the board geometry, the
//! common image size, the accepted correspondence views and the
//! succeeded/skipped counters. An image whose detection failed contributes
//! *nothing* to the view set.

use std::path::Path;

use thiserror::Error;

use camcal_core::{BoardSpec, CorrespondenceView, ImageSize, Pt2, Pt3, ViewError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("image size {got} does not match the session's {expected}")]
    SizeMismatch { expected: ImageSize, got: ImageSize },

    #[error("detected corner count {got} does not match the {expected}-corner board")]
    CornerCountMismatch { expected: usize, got: usize },

    #[error(transparent)]
    View(#[from] ViewError),
}

/// Accumulator for one calibration run.
#[derive(Debug)]
pub struct CalibrationSession {
    board: BoardSpec,
    /// Board corners in the board frame, generated once and shared by every
    /// view.
    object: Vec<Pt3>,
    image_size: Option<ImageSize>,
    views: Vec<CorrespondenceView>,
    succeeded: usize,
    skipped: usize,
}

impl CalibrationSession {
    pub fn new(board: BoardSpec) -> Self {
        Self {
            board,
            object: board.object_points(),
            image_size: None,
            views: Vec::new(),
            succeeded: 0,
            skipped: 0,
        }
    }

    /// Record the outcome of corner detection for one image.
    ///
    /// `corners` is the row-major corner list, or `None` when detection
    /// failed; failures are counted and logged but add no view. The first
    /// image fixes the session's image size; later images must match.
    pub fn add_detection(
        &mut self,
        source: &Path,
        size: ImageSize,
        corners: Option<Vec<Pt2>>,
    ) -> Result<(), SessionError> {
        match self.image_size {
            None => self.image_size = Some(size),
            Some(expected) if expected != size => {
                return Err(SessionError::SizeMismatch { expected, got: size });
            }
            Some(_) => {}
        }

        let Some(corners) = corners else {
            self.skipped += 1;
            log::warn!("{}: chessboard not found, skipping", source.display());
            return Ok(());
        };

        if corners.len() != self.board.corner_count() {
            return Err(SessionError::CornerCountMismatch {
                expected: self.board.corner_count(),
                got: corners.len(),
            });
        }

        self.views
            .push(CorrespondenceView::new(self.object.clone(), corners)?);
        self.succeeded += 1;
        log::info!("{}: found {} corners", source.display(), self.board.corner_count());
        Ok(())
    }

    pub fn board(&self) -> &BoardSpec {
        &self.board
    }

    /// Common size of all processed images; `None` before the first one.
    pub fn image_size(&self) -> Option<ImageSize> {
        self.image_size
    }

    pub fn views(&self) -> &[CorrespondenceView] {
        &self.views
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
