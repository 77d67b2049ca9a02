pub mod consts;
pub mod error;
pub mod extract;
pub mod filters;
pub mod linalg;
pub mod movie;
pub mod roi;
pub mod spikes;

pub use error::{Result, VoltraceError};
pub use extract::{extract_cell, CellResult, ExtractionConfig, WeightUpdateMethod};
pub use movie::{ContextBox, Movie};
pub use spikes::ThresholdMethod;
