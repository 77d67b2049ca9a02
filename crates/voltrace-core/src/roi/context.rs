use ndarray::Array2;

use crate::error::{Result, VoltraceError};
use crate::movie::ContextBox;

use super::morphology::{dilate_disk, dilate_square};

/// The part of the frame a cell is processed in, with its local masks.
#[derive(Clone, Debug)]
pub struct ContextWindow {
    pub bbox: ContextBox,
    /// ROI cropped to `bbox`.
    pub roi: Array2<bool>,
    /// Pixels of `bbox` outside the censor region around the ROI.
    pub background: Array2<bool>,
}

impl ContextWindow {
    /// Bound the ROI dilated by a `context_size` square, then mark as
    /// background everything farther than `censor_size` from the ROI.
    pub fn from_roi(mask: &Array2<bool>, context_size: usize, censor_size: usize) -> Result<Self> {
        let expanded = dilate_square(mask, context_size);
        let bbox = bounding_box(&expanded).ok_or(VoltraceError::EmptyRoi)?;

        let roi = bbox.crop(mask);
        let censored = dilate_disk(&roi, censor_size);
        let background = censored.mapv(|v| !v);

        Ok(Self {
            bbox,
            roi,
            background,
        })
    }

    pub fn dim(&self) -> (usize, usize) {
        self.bbox.dim()
    }

    /// Row-major indices of ROI pixels within the window.
    pub fn roi_indices(&self) -> Vec<usize> {
        flat_indices(&self.roi)
    }

    /// Row-major indices of background pixels within the window.
    pub fn background_indices(&self) -> Vec<usize> {
        flat_indices(&self.background)
    }
}

/// Smallest box containing every true pixel, or `None` for an empty mask.
pub fn bounding_box(mask: &Array2<bool>) -> Option<ContextBox> {
    let mut bbox: Option<ContextBox> = None;
    for ((r, c), _) in mask.indexed_iter().filter(|(_, &v)| v) {
        bbox = Some(match bbox {
            None => ContextBox {
                row_start: r,
                row_end: r,
                col_start: c,
                col_end: c,
            },
            Some(b) => ContextBox {
                row_start: b.row_start.min(r),
                row_end: b.row_end.max(r),
                col_start: b.col_start.min(c),
                col_end: b.col_end.max(c),
            },
        });
    }
    bbox
}

fn flat_indices(mask: &Array2<bool>) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter(|(_, &v)| v)
        .map(|(i, _)| i)
        .collect()
}
