use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoltraceError {
    #[error("Dimensions of movie ({movie_height}x{movie_width}) and mask ({mask_height}x{mask_width}) do not agree")]
    DimensionMismatch {
        movie_height: usize,
        movie_width: usize,
        mask_height: usize,
        mask_width: usize,
    },

    #[error("Unknown threshold policy: {0:?} (expected \"simple\" or \"adaptive\")")]
    UnknownThresholdPolicy(String),

    #[error("Unknown weight update policy: {0:?} (expected \"ridge\" or \"nmf\")")]
    UnknownWeightUpdate(String),

    #[error("Insufficient peaks: {0}")]
    InsufficientPeaks(String),

    #[error("Cross validation of regularization parameters is not available")]
    CrossValidationUnsupported,

    #[error("Normalized cutoff {normalized} (from {freq} Hz) must lie in (0, 1)")]
    InvalidFrequency { freq: f64, normalized: f64 },

    #[error("Signal of length {len} must be longer than the filter padding ({padlen})")]
    SignalTooShort { len: usize, padlen: usize },

    #[error("ROI mask selects no pixels")]
    EmptyRoi,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Linear algebra error: {0}")]
    LinearAlgebra(String),
}

impl VoltraceError {
    pub(crate) fn dimension_mismatch(movie: (usize, usize), mask: (usize, usize)) -> Self {
        Self::DimensionMismatch {
            movie_height: movie.0,
            movie_width: movie.1,
            mask_height: mask.0,
            mask_width: mask.1,
        }
    }
}

pub type Result<T> = std::result::Result<T, VoltraceError>;
