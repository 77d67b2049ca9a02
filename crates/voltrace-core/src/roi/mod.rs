pub mod context;
pub mod morphology;

pub use context::{bounding_box, ContextWindow};
pub use morphology::{dilate_disk, dilate_square};
