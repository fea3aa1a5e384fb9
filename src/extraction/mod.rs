//! Cutting source images into patches

/// Non-overlapping block partition for training patch generation
pub mod blocks;
/// Overlapping patch extraction driven by the patch grid
pub mod patches;

pub use patches::{ExtractedPatches, Patch, PatchStream};
