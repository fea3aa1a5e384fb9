//! Patch geometry: origins, groups and coverage of the tiling grid

/// Patch grid walk, edge pinning and count consistency checks
pub mod grid;

pub use grid::{Origin, PatchGrid, PatchGroup, PatchTag};
