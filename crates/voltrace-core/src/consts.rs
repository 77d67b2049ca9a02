/// Minimum pixel count (h*w) to blur a movie with frame-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 4_096;

/// Minimum number of columns to filter a [time, pixel] matrix in parallel.
pub const PARALLEL_COLUMN_THRESHOLD: usize = 16;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f64 = 1e-12;

/// Template half-width in seconds; multiplied by the frame rate to get samples.
pub const TEMPLATE_HALF_WIDTH_SECONDS: f64 = 0.02;

/// Butterworth order used to remove photobleaching from every pixel.
pub const PHOTOBLEACH_FILTER_ORDER: usize = 3;

/// Butterworth order used when high-passing a trace before spike detection.
pub const TRACE_FILTER_ORDER: usize = 5;

/// Butterworth order used to extract subthreshold activity.
pub const SUBTHRESHOLD_FILTER_ORDER: usize = 5;

/// Noise multiplier of the first (template building) simple-threshold pass.
pub const INITIAL_SIMPLE_MULTIPLIER: f64 = 3.5;

/// Number of grid points for the kernel density estimate of peak heights.
pub const KDE_GRID_POINTS: usize = 2001;

/// Fraction of the peak-height range added on each side of the KDE grid.
pub const KDE_RANGE_PADDING: f64 = 0.05;

/// Welch segment length (samples) for the noise power spectrum.
pub const WELCH_SEGMENT_LENGTH: usize = 1000;

/// Short noise records are cut into at least this many Welch segment lengths.
pub const WELCH_MIN_SEGMENTS: usize = 4;

/// PSD floor, relative to the spectrum maximum, before whitening.
pub const PSD_FLOOR_FRACTION: f64 = 1e-12;

/// PSD floor, relative to the spectrum median, before whitening.
pub const PSD_MEDIAN_FLOOR: f64 = 0.1;

/// Kernel size of the blur used for the locality-test design matrix.
pub const LOCALITY_BLUR_KERNEL: usize = 7;

/// Sigma of the blur used for the locality-test design matrix.
pub const LOCALITY_BLUR_SIGMA: f64 = 1.5;

/// Ridge strength of the spatial update, as a fraction of the squared
/// Frobenius norm of the design matrix.
pub const SPATIAL_RIDGE_FRACTION: f64 = 1e-2;

/// Index into `sigmas` used for the regression design matrix.
pub const SPATIAL_SIGMA_INDEX: usize = 1;

/// Inner passes of the NMF-style weight update.
pub const NMF_INNER_PASSES: usize = 5;

/// Relative residual tolerance for the CGLS ridge solver.
pub const CGLS_TOLERANCE: f64 = 1e-8;

/// Iteration cap for the CGLS ridge solver.
pub const CGLS_MAX_ITERATIONS: usize = 1_000;

/// Singular values below this fraction of the largest are treated as zero.
pub const SINGULAR_VALUE_CUTOFF: f64 = 1e-10;

pub const DEFAULT_CONTEXT_SIZE: usize = 35;
pub const DEFAULT_CENSOR_SIZE: usize = 12;
pub const DEFAULT_FLIP_SIGNAL: bool = true;
pub const DEFAULT_HP_FREQ_PB: f64 = 1.0 / 3.0;
pub const DEFAULT_N_PC_BG: usize = 8;
pub const DEFAULT_RIDGE_BG: f64 = 0.01;
pub const DEFAULT_HP_FREQ: f64 = 1.0;
pub const DEFAULT_CLIP: usize = 100;
pub const DEFAULT_MIN_SPIKES: usize = 10;
pub const DEFAULT_THRESHOLD: f64 = 3.0;
pub const DEFAULT_PNORM_INITIAL: f64 = 0.25;
pub const DEFAULT_PNORM: f64 = 0.5;
pub const DEFAULT_SIGMAS: [f64; 3] = [1.0, 1.5, 2.0];
pub const DEFAULT_N_ITER: usize = 2;
pub const DEFAULT_SUB_FREQ: f64 = 20.0;
