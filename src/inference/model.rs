//! Model boundary for patch-wise segmentation

use crate::io::configuration::MODEL_CHANNELS;
use crate::io::error::BoxError;
use ndarray::{Array4, ArrayView4, Axis, Zip};

/// A trained classifier producing per-pixel class scores for patches
///
/// Receives `(batch, patch_size, patch_size, 3)` intensities in `[0, 1]` and
/// returns `(batch, patch_size, patch_size, n_classes)` scores. The last batch
/// of an image may hold fewer patches than the configured batch size.
pub trait SegmentationModel {
    /// Predict class scores for a batch of patches
    ///
    /// # Errors
    ///
    /// Any model failure; the engine propagates it without retrying
    fn predict(&mut self, batch: ArrayView4<'_, f32>) -> Result<Array4<f32>, BoxError>;
}

impl<F> SegmentationModel for F
where
    F: FnMut(ArrayView4<'_, f32>) -> Result<Array4<f32>, BoxError>,
{
    fn predict(&mut self, batch: ArrayView4<'_, f32>) -> Result<Array4<f32>, BoxError> {
        self(batch)
    }
}

/// Default colour spread of [`NearestColorModel`] in normalised RGB units
pub const DEFAULT_COLOR_SPREAD: f32 = 0.1;

/// Reference classifier scoring each pixel by its distance to class colours
///
/// Scores follow a Gaussian of the RGB distance, normalised to sum to one per
/// pixel. The nearest colour always receives the highest score, so the model
/// reproduces a palette-rendered label map exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestColorModel {
    colors: Vec<[f32; 3]>,
    spread: f32,
}

impl NearestColorModel {
    /// Create a model with one class per colour
    pub fn new(colors: &[[u8; 3]]) -> Self {
        Self::with_spread(colors, DEFAULT_COLOR_SPREAD)
    }

    /// Create a model with a custom colour spread
    pub fn with_spread(colors: &[[u8; 3]], spread: f32) -> Self {
        Self {
            colors: colors
                .iter()
                .map(|color| color.map(|channel| f32::from(channel) / 255.0))
                .collect(),
            spread,
        }
    }

    /// Number of classes the model scores
    pub const fn n_classes(&self) -> usize {
        self.colors.len()
    }
}

impl SegmentationModel for NearestColorModel {
    fn predict(&mut self, batch: ArrayView4<'_, f32>) -> Result<Array4<f32>, BoxError> {
        let (count, height, width, channels) = batch.dim();
        if channels < MODEL_CHANNELS {
            return Err(format!("expected {MODEL_CHANNELS} colour channels, got {channels}").into());
        }
        if self.colors.is_empty() {
            return Err("model has no class colours".into());
        }

        let mut scores = Array4::<f32>::zeros((count, height, width, self.colors.len()));
        let denominator = 2.0 * self.spread * self.spread;

        Zip::from(scores.lanes_mut(Axis(3)))
            .and(batch.lanes(Axis(3)))
            .for_each(|mut pixel_scores, pixel| {
                let squared_distances: Vec<f32> = self
                    .colors
                    .iter()
                    .map(|color| {
                        color
                            .iter()
                            .zip(pixel.iter())
                            .map(|(c, p)| (c - p) * (c - p))
                            .sum()
                    })
                    .collect();
                let nearest = squared_distances
                    .iter()
                    .copied()
                    .fold(f32::INFINITY, f32::min);

                // Shifting by the nearest distance keeps the best score at 1
                let mut total = 0.0;
                for (score, distance) in pixel_scores.iter_mut().zip(&squared_distances) {
                    *score = (-(distance - nearest) / denominator).exp();
                    total += *score;
                }
                pixel_scores.mapv_inplace(|score| score / total);
            });

        Ok(scores)
    }
}
