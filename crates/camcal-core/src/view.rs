//! Paired 2D/3D observations of the calibration target in one image.

use thiserror::Error;

use crate::math::{Pt2, Pt3};

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("object/image point counts differ ({object} vs {image})")]
    LengthMismatch { object: usize, image: usize },

    #[error("a correspondence view must not be empty")]
    Empty,
}

/// One view of the board: object points paired positionally with the
/// detected image points (`object[i]` projects to `image[i]`).
#[derive(Clone, Debug)]
pub struct CorrespondenceView {
    object: Vec<Pt3>,
    image: Vec<Pt2>,
}

impl CorrespondenceView {
    /// Build a view, enforcing equal non-zero lengths.
    pub fn new(object: Vec<Pt3>, image: Vec<Pt2>) -> Result<Self, ViewError> {
        if object.len() != image.len() {
            return Err(ViewError::LengthMismatch {
                object: object.len(),
                image: image.len(),
            });
        }
        if object.is_empty() {
            return Err(ViewError::Empty);
        }
        Ok(Self { object, image })
    }

    pub fn len(&self) -> usize {
        self.object.len()
    }

    pub fn is_empty(&self) -> bool {
        self.object.is_empty()
    }

    pub fn object_points(&self) -> &[Pt3] {
        &self.object
    }

    pub fn image_points(&self) -> &[Pt2] {
        &self.image
    }

    /// Iterate over `(object, image)` pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (&Pt3, &Pt2)> {
        self.object.iter().zip(self.image.iter())
    }
}
