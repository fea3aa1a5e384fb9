//! Patch grid computation for overlapping square tiling
//!
//! Walks the image with a regular stride and pins one extra column of patches
//! to the right border and one extra row to the bottom border, so that every
//! pixel is covered even when the dimensions are not a multiple of the stride.
//! The bottom-right corner patch closes the right-edge group; when the last
//! walk row already sits on the bottom border it is not repeated.

use crate::io::configuration::{TilingConfig, validate_patch_geometry};
use crate::io::error::{Result, TilingError};
use bitvec::prelude::*;
use log::debug;

/// Top-left corner of a patch in source image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Origin {
    /// Row of the top-left pixel
    pub row: usize,
    /// Column of the top-left pixel
    pub col: usize,
}

impl Origin {
    /// Create an origin from row and column
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Logical group a patch belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchGroup {
    /// Regular stride grid, interior-safe
    Main,
    /// Column pinned to `image_width - patch_size`, corner last and once
    RightEdge,
    /// Row pinned to `image_height - patch_size`
    BottomEdge,
}

impl PatchGroup {
    /// Rank used when resolving overlaps by overwrite
    ///
    /// Edges are more error-prone, so their specialised patches are written
    /// last: main first, then bottom edge, then right edge.
    pub const fn precedence_rank(self) -> u64 {
        match self {
            Self::Main => 0,
            Self::BottomEdge => 1,
            Self::RightEdge => 2,
        }
    }

    /// Lowercase name used in messages
    pub const fn name(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::RightEdge => "right-edge",
            Self::BottomEdge => "bottom-edge",
        }
    }
}

/// Position metadata travelling with a patch through batching and inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatchTag {
    /// Group the patch was produced in
    pub group: PatchGroup,
    /// Position within the group's walk order
    pub index: usize,
    /// Top-left corner in the source image
    pub origin: Origin,
}

impl PatchTag {
    /// Total order in which overwrite stitching applies patches
    ///
    /// Zero is reserved for "never written".
    pub const fn precedence(&self) -> u64 {
        (self.group.precedence_rank() << 32) + self.index as u64 + 1
    }
}

/// Expected number of regular patches along one dimension
///
/// The walk keeps origins `k * stride` with `k * stride + patch_size <= dimension`,
/// which gives `(dimension - overlap) / stride` origins.
pub const fn expected_patch_count(dimension: usize, patch_size: usize, overlap: usize) -> usize {
    let stride = patch_size.saturating_sub(overlap);
    if stride == 0 || dimension < patch_size {
        return 0;
    }
    (dimension - overlap) / stride
}

/// Immutable set of patch origins for one (height, width, patch size, overlap)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchGrid {
    image_height: usize,
    image_width: usize,
    patch_size: usize,
    overlap: usize,
    n_vertical_patches: usize,
    n_horizontal_patches: usize,
    main: Vec<Origin>,
    right_edge: Vec<Origin>,
    bottom_edge: Vec<Origin>,
}

impl PatchGrid {
    /// Compute the patch grid for an image
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `patch_size` is zero or `overlap >= patch_size`
    /// - The image is smaller than one patch in either dimension
    /// - The walk disagrees with the stride formula
    pub fn new(
        image_height: usize,
        image_width: usize,
        patch_size: usize,
        overlap: usize,
    ) -> Result<Self> {
        validate_patch_geometry(patch_size, overlap)?;
        if image_height < patch_size || image_width < patch_size {
            return Err(TilingError::ImageTooSmall {
                image_height,
                image_width,
                patch_size,
            });
        }

        let stride = patch_size - overlap;
        let last_row = image_height - patch_size;
        let last_col = image_width - patch_size;

        let mut main = Vec::new();
        let mut right_edge = Vec::new();
        let mut row = 0;
        while row + patch_size <= image_height {
            let mut col = 0;
            while col + patch_size <= image_width {
                main.push(Origin::new(row, col));
                col += stride;
            }
            right_edge.push(Origin::new(row, last_col));
            row += stride;
        }

        let mut bottom_edge = Vec::new();
        let mut col = 0;
        while col + patch_size <= image_width {
            bottom_edge.push(Origin::new(last_row, col));
            col += stride;
        }

        if right_edge.last().is_none_or(|origin| origin.row != last_row) {
            right_edge.push(Origin::new(last_row, last_col));
        }

        let grid = Self {
            image_height,
            image_width,
            patch_size,
            overlap,
            n_vertical_patches: expected_patch_count(image_height, patch_size, overlap),
            n_horizontal_patches: expected_patch_count(image_width, patch_size, overlap),
            main,
            right_edge,
            bottom_edge,
        };
        grid.check_counts()?;

        debug!(
            "Patch grid {image_height}x{image_width} (patch {patch_size}, overlap {overlap}): {} main, {} right-edge, {} bottom-edge",
            grid.main.len(),
            grid.right_edge.len(),
            grid.bottom_edge.len()
        );

        Ok(grid)
    }

    /// Compute the patch grid using a configuration's patch size and overlap
    ///
    /// # Errors
    ///
    /// Same as [`PatchGrid::new`]
    pub fn from_config(image_height: usize, image_width: usize, config: &TilingConfig) -> Result<Self> {
        Self::new(image_height, image_width, config.patch_size, config.overlap)
    }

    const fn last_row_on_stride(&self) -> bool {
        (self.image_height - self.patch_size).is_multiple_of(self.patch_size - self.overlap)
    }

    fn check_counts(&self) -> Result<()> {
        let checks = [
            (
                "main",
                self.n_vertical_patches * self.n_horizontal_patches,
                self.main.len(),
            ),
            (
                "right-edge",
                self.n_vertical_patches + usize::from(!self.last_row_on_stride()),
                self.right_edge.len(),
            ),
            (
                "bottom-edge",
                self.n_horizontal_patches,
                self.bottom_edge.len(),
            ),
        ];
        for (group, expected, actual) in checks {
            if expected != actual {
                return Err(TilingError::GeometryInconsistency {
                    group,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Image height the grid was computed for
    pub const fn image_height(&self) -> usize {
        self.image_height
    }

    /// Image width the grid was computed for
    pub const fn image_width(&self) -> usize {
        self.image_width
    }

    /// Patch side length
    pub const fn patch_size(&self) -> usize {
        self.patch_size
    }

    /// Overlap between neighbouring patches
    pub const fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between successive origins
    pub const fn stride(&self) -> usize {
        self.patch_size - self.overlap
    }

    /// Number of regular grid rows
    pub const fn n_vertical_patches(&self) -> usize {
        self.n_vertical_patches
    }

    /// Number of regular grid columns
    pub const fn n_horizontal_patches(&self) -> usize {
        self.n_horizontal_patches
    }

    /// Origins of one group in walk order
    pub fn group(&self, group: PatchGroup) -> &[Origin] {
        match group {
            PatchGroup::Main => &self.main,
            PatchGroup::RightEdge => &self.right_edge,
            PatchGroup::BottomEdge => &self.bottom_edge,
        }
    }

    /// Total number of patches across all groups
    pub const fn len(&self) -> usize {
        self.main.len() + self.right_edge.len() + self.bottom_edge.len()
    }

    /// Always false for a successfully built grid
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tags in extraction order: main, right edge, bottom edge
    pub fn tags(&self) -> Vec<PatchTag> {
        [
            PatchGroup::Main,
            PatchGroup::RightEdge,
            PatchGroup::BottomEdge,
        ]
        .into_iter()
        .flat_map(|group| {
            self.group(group)
                .iter()
                .enumerate()
                .map(move |(index, &origin)| PatchTag {
                    group,
                    index,
                    origin,
                })
        })
        .collect()
    }

    /// Tags sorted by overwrite precedence: main, bottom edge, right edge
    pub fn tags_in_precedence_order(&self) -> Vec<PatchTag> {
        let mut tags = self.tags();
        tags.sort_by_key(PatchTag::precedence);
        tags
    }

    /// Count pixels not covered by any patch
    ///
    /// Always zero for a valid grid; exposed so callers can assert coverage
    /// of unusual geometries.
    pub fn uncovered_pixels(&self) -> usize {
        let mut covered = bitvec![0; self.image_height * self.image_width];
        for tag in self.tags() {
            for row in tag.origin.row..tag.origin.row + self.patch_size {
                let start = row * self.image_width + tag.origin.col;
                if let Some(span) = covered.get_mut(start..start + self.patch_size) {
                    span.fill(true);
                }
            }
        }
        covered.count_zeros()
    }
}
