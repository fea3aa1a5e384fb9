//! Spatial weighting kernel for seam-free blending
//!
//! The kernel is the outer product of a 1-D Gaussian profile with itself,
//! normalised to unit sum and scaled by a constant gain. It is highest at the
//! patch centre and tapers towards the borders, where predictions suffer from
//! missing context.

use crate::io::configuration::TilingConfig;
use crate::io::error::{Result, invalid_parameter};
use ndarray::{Array1, Array2, ArrayView2};
use num_traits::Float;

/// Unnormalised Gaussian at `offset` from the centre
pub fn gaussian_weight<F: Float>(offset: F, sigma: F) -> F {
    let two = F::one() + F::one();
    (-(offset * offset) / (two * sigma * sigma)).exp()
}

/// Symmetric Gaussian window of `window` points, peak value one
pub fn gaussian_window(window: usize, sigma: f64) -> Vec<f64> {
    let centre = (window as f64 - 1.0) / 2.0;
    (0..window)
        .map(|i| gaussian_weight(i as f64 - centre, sigma))
        .collect()
}

/// Gaussian window of `window` points resampled onto `length` pixels
///
/// Pixel centres are mapped linearly onto the window's coordinate range, so
/// `length == window` reproduces [`gaussian_window`] exactly.
pub fn resampled_profile(length: usize, window: usize, sigma: f64) -> Vec<f64> {
    let scale = window as f64 / length as f64;
    let centre = (window as f64 - 1.0) / 2.0;
    (0..length)
        .map(|i| {
            let position = (i as f64 + 0.5).mul_add(scale, -0.5);
            gaussian_weight(position - centre, sigma)
        })
        .collect()
}

/// Per-pixel weights applied to patch predictions in weighted mode
#[derive(Debug, Clone, PartialEq)]
pub struct BlendKernel {
    weights: Array2<f32>,
}

impl BlendKernel {
    /// Build a `patch_size` square Gaussian kernel
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Any parameter is zero, negative or not finite
    /// - The profile is so narrow that some weights underflow to zero
    pub fn gaussian(patch_size: usize, sigma: f64, window: usize, gain: f64) -> Result<Self> {
        if patch_size == 0 {
            return Err(invalid_parameter(
                "patch_size",
                &patch_size,
                &"must be positive",
            ));
        }
        if window == 0 {
            return Err(invalid_parameter(
                "kernel_window",
                &window,
                &"must be positive",
            ));
        }
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(invalid_parameter(
                "kernel_sigma",
                &sigma,
                &"must be a positive finite number",
            ));
        }
        if !(gain.is_finite() && gain > 0.0) {
            return Err(invalid_parameter(
                "kernel_gain",
                &gain,
                &"must be a positive finite number",
            ));
        }

        let profile = Array1::from(resampled_profile(patch_size, window, sigma));
        let column = profile.view().insert_axis(ndarray::Axis(1));
        let row = profile.view().insert_axis(ndarray::Axis(0));
        let outer = &column * &row;
        let total = outer.sum();

        let weights = outer.mapv(|weight| (weight / total * gain) as f32);
        // Zero weights would leave pixels unnormalisable after blending
        if weights.iter().any(|&weight| !(weight.is_finite() && weight > 0.0)) {
            return Err(invalid_parameter(
                "kernel_sigma",
                &sigma,
                &"is too narrow for the patch size; border weights vanish",
            ));
        }

        Ok(Self { weights })
    }

    /// Build the kernel described by a configuration
    ///
    /// # Errors
    ///
    /// Same as [`BlendKernel::gaussian`]
    pub fn from_config(config: &TilingConfig) -> Result<Self> {
        Self::gaussian(
            config.patch_size,
            config.kernel_sigma,
            config.kernel_window,
            config.kernel_gain,
        )
    }

    /// Kernel weights, `(patch_size, patch_size)`
    pub fn weights(&self) -> ArrayView2<'_, f32> {
        self.weights.view()
    }

    /// Side length of the kernel
    pub fn size(&self) -> usize {
        self.weights.dim().0
    }
}
