//! Non-overlapping block partition used to build training patches
//!
//! Unlike inference extraction, blocks follow "VALID" semantics: the strips at
//! the right and bottom that are narrower than one block are dropped. Training
//! data tolerates that loss; inference never uses this partition.

use crate::extraction::patches::{Patch, color_channels, extract_patch};
use crate::geometry::grid::{Origin, PatchGroup, PatchTag};
use crate::io::error::{Result, invalid_parameter};
use ndarray::ArrayView3;

/// Number of whole blocks along (rows, columns)
pub const fn block_counts(height: usize, width: usize, patch_size: usize) -> (usize, usize) {
    if patch_size == 0 {
        return (0, 0);
    }
    (height / patch_size, width / patch_size)
}

/// Partition an image into whole `patch_size` blocks in row-major order
///
/// Images smaller than one block produce no blocks.
///
/// # Errors
///
/// Returns an error if `patch_size` is zero
pub fn extract_blocks<T: Clone>(
    image: ArrayView3<'_, T>,
    patch_size: usize,
    drop_alpha_channel: bool,
) -> Result<Vec<Patch<T>>> {
    if patch_size == 0 {
        return Err(invalid_parameter(
            "patch_size",
            &patch_size,
            &"must be positive",
        ));
    }

    let image = color_channels(image, drop_alpha_channel);
    let (height, width, _) = image.dim();
    let (rows, cols) = block_counts(height, width, patch_size);

    let mut blocks = Vec::with_capacity(rows * cols);
    for block_row in 0..rows {
        for block_col in 0..cols {
            let tag = PatchTag {
                group: PatchGroup::Main,
                index: block_row * cols + block_col,
                origin: Origin::new(block_row * patch_size, block_col * patch_size),
            };
            blocks.push(extract_patch(image, tag, patch_size)?);
        }
    }

    Ok(blocks)
}
