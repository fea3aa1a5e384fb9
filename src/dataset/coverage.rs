//! Ground-truth coverage of training patches
//!
//! Coverage is the share of a patch's pixels whose class is not background.
//! Patches below the configured limit carry too little signal to train on and
//! are discarded; pure-background patches are reported separately.

use crate::io::configuration::{
    BACKGROUND_CLASS_ID, MASK_FALSE_VALUE, MASK_TRUE_VALUE, PATCH_COVERAGE_PERCENT_LIMIT,
};
use crate::io::error::{Result, invalid_parameter};
use ndarray::{Array2, ArrayView2, Zip};
use num_traits::PrimInt;

/// Percentage in `[0, 100]` of pixels whose class differs from `background`
///
/// An empty mask has no coverage.
pub fn coverage_percent<T: PrimInt>(mask: ArrayView2<'_, T>, background: T) -> f64 {
    let total = mask.len();
    if total == 0 {
        return 0.0;
    }
    let labelled = mask.iter().filter(|&&class| class != background).count();
    if labelled == total {
        return 100.0;
    }
    100.0 * labelled as f64 / total as f64
}

/// Whether every pixel of the mask is background
pub fn is_background_only<T: PrimInt>(mask: ArrayView2<'_, T>, background: T) -> bool {
    mask.iter().all(|&class| class == background)
}

/// Whether a binary mask pixel is set
///
/// Mask patches go through lossy encoders, so anything above the
/// midpoint of the binary range counts as set.
pub const fn is_mask_pixel_set(value: u8) -> bool {
    value > MASK_FALSE_VALUE + (MASK_TRUE_VALUE - MASK_FALSE_VALUE) / 2
}

/// Binary mask of one class for a single patch
#[derive(Debug, Clone, Copy)]
pub struct ClassMask<'a> {
    /// Class the set pixels belong to
    pub class_id: u8,
    /// Binary mask, `MASK_TRUE_VALUE` where the class is present
    pub mask: ArrayView2<'a, u8>,
}

/// Merge per-class binary masks into one class-id map
///
/// Unset pixels stay background; where masks overlap, later masks win.
///
/// # Errors
///
/// Returns an error if a mask is not `height` x `width`
pub fn stack_class_masks(masks: &[ClassMask<'_>], height: usize, width: usize) -> Result<Array2<u8>> {
    let mut classes = Array2::from_elem((height, width), BACKGROUND_CLASS_ID);
    for class_mask in masks {
        if class_mask.mask.dim() != (height, width) {
            let (mask_height, mask_width) = class_mask.mask.dim();
            return Err(invalid_parameter(
                "mask",
                &format!("{mask_height}x{mask_width}"),
                &format!(
                    "class {} mask does not match patch size {height}x{width}",
                    class_mask.class_id
                ),
            ));
        }
        Zip::from(&mut classes)
            .and(class_mask.mask)
            .for_each(|class, &value| {
                if is_mask_pixel_set(value) {
                    *class = class_mask.class_id;
                }
            });
    }
    Ok(classes)
}

/// Outcome of filtering one training patch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchVerdict {
    /// Coverage reaches the limit
    Keep,
    /// Some labelled pixels, but fewer than the limit
    LowCoverage,
    /// No labelled pixel at all
    BackgroundOnly,
}

/// Discards training patches whose labelled area is too small
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverageFilter {
    limit_percent: f64,
    background: u8,
}

impl Default for CoverageFilter {
    fn default() -> Self {
        Self {
            limit_percent: PATCH_COVERAGE_PERCENT_LIMIT,
            background: BACKGROUND_CLASS_ID,
        }
    }
}

impl CoverageFilter {
    /// Create a filter keeping patches with at least `limit_percent` coverage
    ///
    /// # Errors
    ///
    /// Returns an error if the limit is outside `[0, 100]`
    pub fn new(limit_percent: f64, background: u8) -> Result<Self> {
        if !(0.0..=100.0).contains(&limit_percent) {
            return Err(invalid_parameter(
                "coverage_limit",
                &limit_percent,
                &"must be a percentage between 0 and 100",
            ));
        }
        Ok(Self {
            limit_percent,
            background,
        })
    }

    /// Minimum coverage kept
    pub const fn limit_percent(&self) -> f64 {
        self.limit_percent
    }

    /// Background class id
    pub const fn background(&self) -> u8 {
        self.background
    }

    /// Classify an already computed coverage percentage
    pub fn verdict(&self, percent: f64) -> PatchVerdict {
        if percent <= 0.0 {
            PatchVerdict::BackgroundOnly
        } else if percent < self.limit_percent {
            PatchVerdict::LowCoverage
        } else {
            PatchVerdict::Keep
        }
    }

    /// Compute coverage of a class-id mask and classify it
    pub fn evaluate(&self, mask: ArrayView2<'_, u8>) -> (f64, PatchVerdict) {
        let percent = coverage_percent(mask, self.background);
        (percent, self.verdict(percent))
    }
}

/// Verdict counts over a set of patches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoverageSummary {
    /// Patches kept for training
    pub kept: usize,
    /// Patches discarded for low coverage
    pub low_coverage: usize,
    /// Patches with no labelled pixel
    pub background_only: usize,
}

impl CoverageSummary {
    /// Count one verdict
    pub const fn record(&mut self, verdict: PatchVerdict) {
        match verdict {
            PatchVerdict::Keep => self.kept += 1,
            PatchVerdict::LowCoverage => self.low_coverage += 1,
            PatchVerdict::BackgroundOnly => self.background_only += 1,
        }
    }

    /// Patches counted so far
    pub const fn total(&self) -> usize {
        self.kept + self.low_coverage + self.background_only
    }
}
