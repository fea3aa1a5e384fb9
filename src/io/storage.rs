//! On-disk layout of training patches
//!
//! Every non-overlapping block of a photograph gets its own numbered directory
//! holding the image patch and one ground-truth mask patch per class:
//!
//! ```text
//! <root>/<image>/<n>/image/<image>_patch_<n>.jpg
//! <root>/<image>/<n>/labels/<class>/<image>_patch_<n>_labels_<class>.png
//! ```
//!
//! Patch numbers start at one. Source masks are read from
//! `<masks>/<image>/<class>/*.png`.

use crate::dataset::coverage::{ClassMask, stack_class_masks};
use crate::extraction::blocks::extract_blocks;
use crate::io::error::{Result, TilingError, WithContext, path_error};
use crate::io::image::{load_mask, save_gray, save_rgb};
use crate::io::palette::ClassPalette;
use log::{debug, warn};
use ndarray::{Array2, ArrayView2, ArrayView3, Axis, Zip};
use std::path::{Path, PathBuf};

const IMAGE_DIR: &str = "image";
const LABELS_DIR: &str = "labels";

/// Sorted entries of a directory
fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir).with_file_operation(dir, "read directory")? {
        entries.push(entry.with_file_operation(dir, "read directory")?.path());
    }
    entries.sort();
    Ok(entries)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| path_error(path, "name is not valid UTF-8"))
}

/// One stored patch directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPatch {
    /// Stem of the photograph the patch was cut from
    pub stem: String,
    /// One-based patch number
    pub number: usize,
    /// Path of the image patch
    pub image_path: PathBuf,
    /// Directory holding one sub-directory per class
    pub labels_dir: PathBuf,
}

/// Paths of a training patch tree rooted at one directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchLayout {
    root: PathBuf,
}

impl PatchLayout {
    /// Layout rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one patch
    pub fn patch_dir(&self, stem: &str, number: usize) -> PathBuf {
        self.root.join(stem).join(number.to_string())
    }

    /// Path of an image patch
    pub fn image_patch_path(&self, stem: &str, number: usize) -> PathBuf {
        self.patch_dir(stem, number)
            .join(IMAGE_DIR)
            .join(format!("{stem}_patch_{number}.jpg"))
    }

    /// Path of one class's mask patch
    pub fn label_patch_path(&self, stem: &str, number: usize, class: &str) -> PathBuf {
        self.patch_dir(stem, number)
            .join(LABELS_DIR)
            .join(class)
            .join(format!("{stem}_patch_{number}_labels_{class}.png"))
    }

    /// Cut a photograph into blocks and save each one
    ///
    /// Returns the number of patches written.
    ///
    /// # Errors
    ///
    /// Returns an error if the patch size is zero or a patch cannot be saved
    pub fn save_image_patches(
        &self,
        stem: &str,
        image: ArrayView3<'_, u8>,
        patch_size: usize,
    ) -> Result<usize> {
        let blocks = extract_blocks(image, patch_size, true)?;
        for block in &blocks {
            save_rgb(block.data.view(), &self.image_patch_path(stem, block.tag.index + 1))?;
        }
        debug!("Saved {} image patches for {stem}", blocks.len());
        Ok(blocks.len())
    }

    /// Cut one class mask into blocks and save each one
    ///
    /// Block numbering matches [`PatchLayout::save_image_patches`] for an
    /// image of the same size.
    ///
    /// # Errors
    ///
    /// Returns an error if the patch size is zero or a patch cannot be saved
    pub fn save_label_patches(
        &self,
        stem: &str,
        class: &str,
        mask: ArrayView2<'_, u8>,
        patch_size: usize,
    ) -> Result<usize> {
        let blocks = extract_blocks(mask.insert_axis(Axis(2)), patch_size, false)?;
        for block in &blocks {
            let path = self.label_patch_path(stem, block.tag.index + 1, class);
            save_gray(block.data.index_axis(Axis(2), 0), &path)?;
        }
        debug!("Saved {} {class} mask patches for {stem}", blocks.len());
        Ok(blocks.len())
    }

    /// Every stored patch, sorted by image stem then patch number
    ///
    /// Directories without an image patch are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree cannot be read
    pub fn stored_patches(&self) -> Result<Vec<StoredPatch>> {
        let mut patches = Vec::new();
        for image_dir in sorted_entries(&self.root)? {
            if !image_dir.is_dir() {
                continue;
            }
            let stem = file_name(&image_dir)?;
            for patch_dir in sorted_entries(&image_dir)? {
                let Ok(number) = file_name(&patch_dir)?.parse::<usize>() else {
                    continue;
                };
                let image_path = self.image_patch_path(&stem, number);
                if !image_path.is_file() {
                    warn!("Skipping {}: no image patch", patch_dir.display());
                    continue;
                }
                patches.push(StoredPatch {
                    stem: stem.clone(),
                    number,
                    image_path,
                    labels_dir: patch_dir.join(LABELS_DIR),
                });
            }
        }
        patches.sort_by(|a, b| a.stem.cmp(&b.stem).then(a.number.cmp(&b.number)));
        Ok(patches)
    }

    /// Class-id map of a stored patch built from its mask patches
    ///
    /// Classes missing from the palette are skipped with a warning; a patch
    /// without labels is entirely background.
    ///
    /// # Errors
    ///
    /// Returns an error if a mask cannot be read or its size differs from the
    /// image patch
    pub fn class_map(&self, patch: &StoredPatch, palette: &ClassPalette) -> Result<Array2<u8>> {
        let (width, height) =
            image::image_dimensions(&patch.image_path).map_err(|e| TilingError::ImageLoad {
                path: patch.image_path.clone(),
                source: e,
            })?;

        let mut masks = Vec::new();
        if patch.labels_dir.is_dir() {
            for label_dir in sorted_entries(&patch.labels_dir)? {
                let class = file_name(&label_dir)?;
                let Some(class_id) = palette.class_id(&class) else {
                    warn!("Unknown class {class} in {}", patch.labels_dir.display());
                    continue;
                };
                let path = self.label_patch_path(&patch.stem, patch.number, &class);
                if path.is_file() {
                    masks.push((class_id, load_mask(&path)?));
                }
            }
        }
        // Later classes overwrite earlier ones
        masks.sort_by_key(|(class_id, _)| *class_id);

        let views: Vec<ClassMask<'_>> = masks
            .iter()
            .map(|(class_id, mask)| ClassMask {
                class_id: *class_id,
                mask: mask.view(),
            })
            .collect();
        stack_class_masks(&views, height as usize, width as usize)
    }

    /// Coverage cache key of a stored patch, relative to the root
    pub fn cache_key(&self, patch: &StoredPatch) -> String {
        patch
            .image_path
            .strip_prefix(&self.root)
            .unwrap_or(&patch.image_path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

/// Read every source mask of one photograph, one per known class
///
/// All PNG files in a class directory are merged by taking their per-pixel
/// maximum. Classes missing from the palette are skipped with a warning.
///
/// # Errors
///
/// Returns an error if a directory or mask cannot be read, or if masks of one
/// class differ in size
pub fn load_source_masks(
    masks_dir: &Path,
    stem: &str,
    palette: &ClassPalette,
) -> Result<Vec<(String, Array2<u8>)>> {
    let image_masks = masks_dir.join(stem);
    if !image_masks.is_dir() {
        warn!("No masks for {stem} under {}", masks_dir.display());
        return Ok(Vec::new());
    }

    let mut masks = Vec::new();
    for class_dir in sorted_entries(&image_masks)? {
        if !class_dir.is_dir() {
            continue;
        }
        let class = file_name(&class_dir)?;
        if palette.class_id(&class).is_none() {
            warn!("Unknown class {class} for {stem}");
            continue;
        }

        let mut merged: Option<Array2<u8>> = None;
        for path in sorted_entries(&class_dir)? {
            if !has_extension(&path, "png") {
                continue;
            }
            let mask = load_mask(&path)?;
            match merged.as_mut() {
                None => merged = Some(mask),
                Some(current) if current.dim() == mask.dim() => {
                    Zip::from(current)
                        .and(&mask)
                        .for_each(|value, &other| *value = (*value).max(other));
                }
                Some(_) => return Err(path_error(&path, "mask size differs from its class")),
            }
        }
        if let Some(mask) = merged {
            masks.push((class, mask));
        }
    }
    Ok(masks)
}
