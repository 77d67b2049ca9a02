use ndarray::{s, Array2, Array3, ArrayView3};

use crate::error::{Result, VoltraceError};

/// A voltage-imaging movie held fully in memory.
/// Shape = (frames, height, width), row-major frames.
#[derive(Clone, Debug)]
pub struct Movie {
    pub data: Array3<f32>,
}

impl Movie {
    pub fn new(data: Array3<f32>) -> Self {
        Self { data }
    }

    pub fn frames(&self) -> usize {
        self.data.dim().0
    }

    pub fn height(&self) -> usize {
        self.data.dim().1
    }

    pub fn width(&self) -> usize {
        self.data.dim().2
    }

    /// Spatial shape of a single frame as (height, width).
    pub fn frame_dim(&self) -> (usize, usize) {
        (self.height(), self.width())
    }

    /// Borrow the sub-movie inside a spatial box.
    pub fn patch(&self, bbox: &ContextBox) -> ArrayView3<'_, f32> {
        self.data.slice(s![
            ..,
            bbox.row_start..=bbox.row_end,
            bbox.col_start..=bbox.col_end
        ])
    }

    /// Fail with `DimensionMismatch` unless `mask` has the frame shape.
    pub fn check_mask(&self, mask: &Array2<bool>) -> Result<()> {
        if mask.dim() != self.frame_dim() {
            return Err(VoltraceError::dimension_mismatch(
                self.frame_dim(),
                mask.dim(),
            ));
        }
        Ok(())
    }
}

/// Inclusive pixel bounds of a cell's context window in frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContextBox {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl ContextBox {
    pub fn height(&self) -> usize {
        self.row_end - self.row_start + 1
    }

    pub fn width(&self) -> usize {
        self.col_end - self.col_start + 1
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.height(), self.width())
    }

    /// Copy the box out of a full field-of-view array.
    pub fn crop<T: Clone>(&self, full: &Array2<T>) -> Array2<T> {
        full.slice(s![
            self.row_start..=self.row_end,
            self.col_start..=self.col_end
        ])
        .to_owned()
    }

    /// Place a context-sized array into a zeroed field of view of shape `fov`.
    pub fn embed(&self, local: &Array2<f64>, fov: (usize, usize)) -> Array2<f64> {
        let mut full = Array2::<f64>::zeros(fov);
        full.slice_mut(s![
            self.row_start..=self.row_end,
            self.col_start..=self.col_end
        ])
        .assign(local);
        full
    }

    /// Corner coordinates as `[[row_start, col_start], [row_end, col_end]]`.
    pub fn corners(&self) -> [[usize; 2]; 2] {
        [
            [self.row_start, self.col_start],
            [self.row_end, self.col_end],
        ]
    }
}
