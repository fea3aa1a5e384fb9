//! Tiling and stitching engine for patch-wise semantic segmentation of large photographs
//!
//! Photographs too large for a segmentation network are cut into overlapping
//! square patches, classified batch by batch, and stitched back into one
//! label map without seams or gaps. The same tiling also prepares training
//! data: non-overlapping patches with their ground-truth masks, filtered by
//! how much of each patch is labelled.

/// Ground-truth coverage filtering and its CSV cache
pub mod dataset;
/// Overlapping and non-overlapping patch extraction
pub mod extraction;
/// Patch origins, groups and grid consistency
pub mod geometry;
/// Model boundary and batched inference
pub mod inference;
/// Input/output operations, configuration and error handling
pub mod io;
/// End-to-end segmentation of one photograph
pub mod pipeline;
/// Reassembly of patch predictions into label maps
pub mod reconstruction;

pub use io::error::{Result, TilingError};
