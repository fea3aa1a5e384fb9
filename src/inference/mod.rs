//! Model boundary and batched inference over tagged patches

/// Batching of patches into model calls with tag preservation
pub mod batch;
/// Segmentation model trait and the reference colour classifier
pub mod model;

pub use batch::{BatchRunner, PatchPrediction};
pub use model::{NearestColorModel, SegmentationModel};
