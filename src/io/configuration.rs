//! Engine configuration, defaults and validation

use crate::io::error::{Result, invalid_parameter};

// Patch geometry
/// Side length of square patches fed to the model
pub const DEFAULT_PATCH_SIZE: usize = 256;
// 20 leaves visible seams, 40 does not
/// Pixels shared by neighbouring patches along one axis
pub const DEFAULT_PATCH_OVERLAP: usize = 40;

// Model boundary
/// Number of classes produced by the model, background included
pub const DEFAULT_N_CLASSES: usize = 10;
/// Patches per model call
pub const DEFAULT_BATCH_SIZE: usize = 8;
/// Labels are stored as `u8`
pub const MAX_CLASSES: usize = 256;
/// Colour channels consumed by the model
pub const MODEL_CHANNELS: usize = 3;

// Weighted blending kernel
/// Standard deviation of the 1-D Gaussian profile
pub const DEFAULT_KERNEL_SIGMA: f64 = 1.0;
/// Window size the Gaussian profile is defined over
pub const DEFAULT_KERNEL_WINDOW: usize = 5;
/// Constant gain applied after normalisation
pub const DEFAULT_KERNEL_GAIN: f64 = 10.0;

// Dataset curation
/// Class id reserved for background
pub const BACKGROUND_CLASS_ID: u8 = 0;
/// Minimum non-background coverage for a training patch
pub const PATCH_COVERAGE_PERCENT_LIMIT: f64 = 75.0;
/// Pixel value marking a set pixel in a binary mask
pub const MASK_TRUE_VALUE: u8 = 255;
/// Pixel value marking an unset pixel in a binary mask
pub const MASK_FALSE_VALUE: u8 = 0;

// Output settings
/// Suffix added to label map filenames
pub const OUTPUT_SUFFIX: &str = "_labels";
/// Extensions accepted as input photographs
pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

// Progress bar display settings
/// Threshold for switching to batch progress mode
pub const MAX_INDIVIDUAL_PROGRESS_BARS: usize = 5;

/// Policy for resolving pixels covered by several patches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum BlendMode {
    /// Later patches in precedence order replace earlier ones
    #[default]
    Overwrite,
    /// Predictions are weighted by a centred Gaussian kernel and averaged
    Weighted,
}

impl std::fmt::Display for BlendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overwrite => write!(f, "overwrite"),
            Self::Weighted => write!(f, "weighted"),
        }
    }
}

/// Every option the tiling engine recognises
#[derive(Debug, Clone, PartialEq)]
pub struct TilingConfig {
    /// Side length of square patches
    pub patch_size: usize,
    /// Pixels shared by neighbouring patches, strictly less than `patch_size`
    pub overlap: usize,
    /// Classes produced by the model
    pub n_classes: usize,
    /// Patches per model call
    pub batch_size: usize,
    /// Overlap resolution policy
    pub blend_mode: BlendMode,
    /// Gaussian standard deviation for weighted blending
    pub kernel_sigma: f64,
    /// Gaussian window size for weighted blending
    pub kernel_window: usize,
    /// Gain applied to the normalised kernel
    pub kernel_gain: f64,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            patch_size: DEFAULT_PATCH_SIZE,
            overlap: DEFAULT_PATCH_OVERLAP,
            n_classes: DEFAULT_N_CLASSES,
            batch_size: DEFAULT_BATCH_SIZE,
            blend_mode: BlendMode::default(),
            kernel_sigma: DEFAULT_KERNEL_SIGMA,
            kernel_window: DEFAULT_KERNEL_WINDOW,
            kernel_gain: DEFAULT_KERNEL_GAIN,
        }
    }
}

impl TilingConfig {
    /// Distance between successive patch origins
    ///
    /// Saturates at zero for invalid configurations; `validate` rejects those.
    pub const fn stride(&self) -> usize {
        self.patch_size.saturating_sub(self.overlap)
    }

    /// Check every parameter against the engine's requirements
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` naming the first offending field
    pub fn validate(&self) -> Result<()> {
        validate_patch_geometry(self.patch_size, self.overlap)?;
        if self.n_classes == 0 || self.n_classes > MAX_CLASSES {
            return Err(invalid_parameter(
                "n_classes",
                &self.n_classes,
                &format!("must be between 1 and {MAX_CLASSES}"),
            ));
        }
        if self.batch_size == 0 {
            return Err(invalid_parameter(
                "batch_size",
                &self.batch_size,
                &"must be positive",
            ));
        }
        if self.blend_mode == BlendMode::Weighted {
            if !(self.kernel_sigma.is_finite() && self.kernel_sigma > 0.0) {
                return Err(invalid_parameter(
                    "kernel_sigma",
                    &self.kernel_sigma,
                    &"must be a positive finite number",
                ));
            }
            if self.kernel_window == 0 {
                return Err(invalid_parameter(
                    "kernel_window",
                    &self.kernel_window,
                    &"must be positive",
                ));
            }
            if !(self.kernel_gain.is_finite() && self.kernel_gain > 0.0) {
                return Err(invalid_parameter(
                    "kernel_gain",
                    &self.kernel_gain,
                    &"must be a positive finite number",
                ));
            }
        }
        Ok(())
    }
}

/// Check that a patch size and overlap give a positive stride
///
/// # Errors
///
/// Returns `InvalidParameter` if `patch_size` is zero or `overlap >= patch_size`
pub fn validate_patch_geometry(patch_size: usize, overlap: usize) -> Result<()> {
    if patch_size == 0 {
        return Err(invalid_parameter(
            "patch_size",
            &patch_size,
            &"must be positive",
        ));
    }
    if overlap >= patch_size {
        return Err(invalid_parameter(
            "overlap",
            &overlap,
            &format!("must be strictly less than patch size {patch_size}"),
        ));
    }
    Ok(())
}
