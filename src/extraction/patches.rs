//! Overlapping patch extraction
//!
//! Cuts a source image into the patches described by a [`PatchGrid`]. Every
//! patch carries its [`PatchTag`] so that batching and inference never have to
//! preserve list order for reconstruction to find the right origin.

use crate::geometry::grid::{Origin, PatchGrid, PatchGroup, PatchTag};
use crate::io::configuration::MODEL_CHANNELS;
use crate::io::error::{Result, TilingError, invalid_parameter};
use ndarray::{Array3, ArrayView3, s};

/// A square sub-image copied out of the source, tagged with its position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch<T> {
    /// Group, walk index and origin of the patch
    pub tag: PatchTag,
    /// Pixel data, `(patch_size, patch_size, channels)`
    pub data: Array3<T>,
}

impl<T> Patch<T> {
    /// Top-left corner in the source image
    pub const fn origin(&self) -> Origin {
        self.tag.origin
    }

    /// Side length of the patch
    pub fn size(&self) -> usize {
        self.data.dim().0
    }
}

/// Patches of one image split by group, each in walk order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPatches<T> {
    /// Regular stride grid patches
    pub main: Vec<Patch<T>>,
    /// Patches pinned to the right border, corner last
    pub right_edge: Vec<Patch<T>>,
    /// Patches pinned to the bottom border
    pub bottom_edge: Vec<Patch<T>>,
}

impl<T> ExtractedPatches<T> {
    /// Patches of one group
    pub fn group(&self, group: PatchGroup) -> &[Patch<T>] {
        match group {
            PatchGroup::Main => &self.main,
            PatchGroup::RightEdge => &self.right_edge,
            PatchGroup::BottomEdge => &self.bottom_edge,
        }
    }

    /// Total number of patches
    pub const fn len(&self) -> usize {
        self.main.len() + self.right_edge.len() + self.bottom_edge.len()
    }

    /// Whether no patch was extracted
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Concatenate main, right-edge and bottom-edge patches
    pub fn into_flat(self) -> Vec<Patch<T>> {
        let mut flat = self.main;
        flat.extend(self.right_edge);
        flat.extend(self.bottom_edge);
        flat
    }
}

/// Restrict an image to its colour channels
///
/// Masks exported with an alpha channel arrive with four channels; only the
/// first three are kept when `drop_alpha_channel` is set.
pub fn color_channels<T>(image: ArrayView3<'_, T>, drop_alpha_channel: bool) -> ArrayView3<'_, T> {
    if drop_alpha_channel && image.dim().2 > MODEL_CHANNELS {
        image.slice_move(s![.., .., ..MODEL_CHANNELS])
    } else {
        image
    }
}

/// Copy the patch described by `tag` out of `image`
///
/// # Errors
///
/// Returns `PatchOutOfBounds` if the patch does not fit inside the image.
/// Origins are never clamped here; the grid already pins edge patches.
pub fn extract_patch<T: Clone>(
    image: ArrayView3<'_, T>,
    tag: PatchTag,
    patch_size: usize,
) -> Result<Patch<T>> {
    let (height, width, _) = image.dim();
    let origin = tag.origin;
    if origin.row + patch_size > height || origin.col + patch_size > width {
        return Err(TilingError::PatchOutOfBounds {
            origin,
            patch_size,
            canvas: (height, width),
        });
    }

    let data = image
        .slice(s![
            origin.row..origin.row + patch_size,
            origin.col..origin.col + patch_size,
            ..
        ])
        .to_owned();

    Ok(Patch { tag, data })
}

fn check_grid_matches(image: &ArrayView3<'_, impl Sized>, grid: &PatchGrid) -> Result<()> {
    let (height, width, _) = image.dim();
    if (height, width) == (grid.image_height(), grid.image_width()) {
        Ok(())
    } else {
        Err(invalid_parameter(
            "image",
            &format!("{height}x{width}"),
            &format!(
                "does not match the patch grid computed for {}x{}",
                grid.image_height(),
                grid.image_width()
            ),
        ))
    }
}

/// Cut an image into main, right-edge and bottom-edge patches
///
/// # Errors
///
/// Returns an error if:
/// - `patch_size` or `overlap` are invalid
/// - The image is smaller than one patch (nothing is extracted)
pub fn extract_patches<T: Clone>(
    image: ArrayView3<'_, T>,
    patch_size: usize,
    overlap: usize,
    drop_alpha_channel: bool,
) -> Result<ExtractedPatches<T>> {
    let (height, width, _) = image.dim();
    let grid = PatchGrid::new(height, width, patch_size, overlap)?;
    extract_with_grid(color_channels(image, drop_alpha_channel), &grid)
}

/// Cut an image into patches using a precomputed grid
///
/// # Errors
///
/// Returns an error if the image dimensions differ from the grid's
pub fn extract_with_grid<T: Clone>(
    image: ArrayView3<'_, T>,
    grid: &PatchGrid,
) -> Result<ExtractedPatches<T>> {
    check_grid_matches(&image, grid)?;

    let mut extracted = ExtractedPatches {
        main: Vec::with_capacity(grid.group(PatchGroup::Main).len()),
        right_edge: Vec::with_capacity(grid.group(PatchGroup::RightEdge).len()),
        bottom_edge: Vec::with_capacity(grid.group(PatchGroup::BottomEdge).len()),
    };

    for tag in grid.tags() {
        let patch = extract_patch(image, tag, grid.patch_size())?;
        match tag.group {
            PatchGroup::Main => extracted.main.push(patch),
            PatchGroup::RightEdge => extracted.right_edge.push(patch),
            PatchGroup::BottomEdge => extracted.bottom_edge.push(patch),
        }
    }

    Ok(extracted)
}

/// Lazy, restartable patch sequence over one image
///
/// Copies one patch per `next` call so that peak memory stays bounded by what
/// the consumer retains. Cloning the stream restarts from the same position.
#[derive(Debug, Clone)]
pub struct PatchStream<'a, T> {
    image: ArrayView3<'a, T>,
    tags: std::vec::IntoIter<PatchTag>,
    patch_size: usize,
}

impl<'a, T: Clone> PatchStream<'a, T> {
    /// Stream every patch of the grid in extraction order
    ///
    /// # Errors
    ///
    /// Returns an error if the image dimensions differ from the grid's
    pub fn new(image: ArrayView3<'a, T>, grid: &PatchGrid) -> Result<Self> {
        check_grid_matches(&image, grid)?;
        Ok(Self::with_tags(image, grid.tags(), grid.patch_size()))
    }

    /// Stream an explicit list of tags
    pub fn with_tags(image: ArrayView3<'a, T>, tags: Vec<PatchTag>, patch_size: usize) -> Self {
        Self {
            image,
            tags: tags.into_iter(),
            patch_size,
        }
    }
}

impl<T: Clone> Iterator for PatchStream<'_, T> {
    type Item = Result<Patch<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.tags
            .next()
            .map(|tag| extract_patch(self.image, tag, self.patch_size))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.tags.size_hint()
    }
}

impl<T: Clone> ExactSizeIterator for PatchStream<'_, T> {}
