pub mod config;
pub mod iterator;
pub mod result;
pub mod weights;

pub use config::ExtractionConfig;
pub use iterator::{correct_shrinkage, extract_cell, locality_test, snr};
pub use result::{CellResult, RawRoiResult};
pub use weights::{DesignMatrix, NmfUpdate, RidgeUpdate, WeightUpdate, WeightUpdateMethod};
