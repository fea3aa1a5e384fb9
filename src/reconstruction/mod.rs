//! Stitching per-patch predictions back into full-resolution label maps

/// Gaussian spatial kernel for weighted blending
pub mod kernel;
/// Class label map and stable arg-max
pub mod label_map;
/// Prediction accumulator with overwrite and weighted blend modes
pub mod stitcher;

pub use label_map::ClassLabelMap;
pub use stitcher::{Stitcher, reconstruct};
