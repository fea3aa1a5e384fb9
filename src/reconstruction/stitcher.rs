//! Reassembly of per-patch predictions into a full-resolution label map
//!
//! Each prediction is placed at its tagged origin inside an accumulator that
//! covers the whole image. Overlaps are resolved either by overwrite, where a
//! per-pixel precedence stamp guarantees that main patches lose to bottom-edge
//! patches which lose to right-edge patches regardless of arrival order, or by
//! a Gaussian-weighted average that removes hard seams.

use crate::inference::batch::PatchPrediction;
use crate::io::configuration::{BlendMode, TilingConfig};
use crate::io::error::{Result, TilingError, invalid_parameter};
use crate::reconstruction::kernel::BlendKernel;
use crate::reconstruction::label_map::ClassLabelMap;
use ndarray::{Array2, Array3, ArrayView2, Axis, Zip, s};

#[derive(Debug, Clone)]
enum Accumulation {
    Overwrite { precedence: Array2<u64> },
    Weighted { weights: Array2<f32>, kernel: BlendKernel },
}

/// Owned accumulator for one image's reconstruction
///
/// Created zeroed, mutated once per prediction and consumed by
/// [`Stitcher::finish`].
#[derive(Debug, Clone)]
pub struct Stitcher {
    scores: Array3<f32>,
    accumulation: Accumulation,
    patch_size: usize,
    patches_applied: usize,
}

impl Stitcher {
    /// Create a zeroed accumulator for an image
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the weighted
    /// kernel cannot be built
    pub fn new(image_height: usize, image_width: usize, config: &TilingConfig) -> Result<Self> {
        config.validate()?;
        let accumulation = match config.blend_mode {
            BlendMode::Overwrite => Accumulation::Overwrite {
                precedence: Array2::zeros((image_height, image_width)),
            },
            BlendMode::Weighted => Accumulation::Weighted {
                weights: Array2::zeros((image_height, image_width)),
                kernel: BlendKernel::from_config(config)?,
            },
        };

        Ok(Self {
            scores: Array3::zeros((image_height, image_width, config.n_classes)),
            accumulation,
            patch_size: config.patch_size,
            patches_applied: 0,
        })
    }

    /// Canvas height
    pub fn height(&self) -> usize {
        self.scores.dim().0
    }

    /// Canvas width
    pub fn width(&self) -> usize {
        self.scores.dim().1
    }

    /// Classes held per pixel
    pub fn n_classes(&self) -> usize {
        self.scores.dim().2
    }

    /// Overlap resolution policy in use
    pub const fn blend_mode(&self) -> BlendMode {
        match self.accumulation {
            Accumulation::Overwrite { .. } => BlendMode::Overwrite,
            Accumulation::Weighted { .. } => BlendMode::Weighted,
        }
    }

    /// Accumulated kernel weight per pixel; `None` in overwrite mode
    pub fn weights(&self) -> Option<ArrayView2<'_, f32>> {
        match &self.accumulation {
            Accumulation::Overwrite { .. } => None,
            Accumulation::Weighted { weights, .. } => Some(weights.view()),
        }
    }

    /// Predictions applied so far
    pub const fn patches_applied(&self) -> usize {
        self.patches_applied
    }

    fn check_prediction(&self, prediction: &PatchPrediction) -> Result<()> {
        let (patch_height, patch_width, n_classes) = prediction.scores.dim();
        if (patch_height, patch_width) != (self.patch_size, self.patch_size) {
            return Err(TilingError::PatchShapeMismatch {
                expected: (self.patch_size, self.patch_size),
                actual: (patch_height, patch_width),
            });
        }
        if n_classes != self.n_classes() {
            return Err(TilingError::ClassCountMismatch {
                expected: self.n_classes(),
                actual: n_classes,
            });
        }
        let origin = prediction.origin();
        if origin.row + self.patch_size > self.height()
            || origin.col + self.patch_size > self.width()
        {
            return Err(TilingError::PatchOutOfBounds {
                origin,
                patch_size: self.patch_size,
                canvas: (self.height(), self.width()),
            });
        }
        Ok(())
    }

    /// Accumulate one patch prediction at its tagged origin
    ///
    /// The accumulator is left untouched when the prediction is rejected.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The prediction is not `patch_size` square (`PatchShapeMismatch`)
    /// - Its class count differs from the accumulator's (`ClassCountMismatch`)
    /// - Origin plus patch size leaves the canvas (`PatchOutOfBounds`)
    pub fn add(&mut self, prediction: &PatchPrediction) -> Result<()> {
        self.check_prediction(prediction)?;

        let origin = prediction.origin();
        let rows = origin.row..origin.row + self.patch_size;
        let cols = origin.col..origin.col + self.patch_size;
        let mut region = self.scores.slice_mut(s![rows.clone(), cols.clone(), ..]);

        match &mut self.accumulation {
            Accumulation::Overwrite { precedence } => {
                let stamp = prediction.tag.precedence();
                Zip::from(precedence.slice_mut(s![rows, cols]))
                    .and(region.lanes_mut(Axis(2)))
                    .and(prediction.scores.lanes(Axis(2)))
                    .for_each(|current, mut target, source| {
                        if stamp >= *current {
                            *current = stamp;
                            target.assign(&source);
                        }
                    });
            }
            Accumulation::Weighted { weights, kernel } => {
                Zip::from(weights.slice_mut(s![rows, cols]))
                    .and(region.lanes_mut(Axis(2)))
                    .and(prediction.scores.lanes(Axis(2)))
                    .and(kernel.weights())
                    .for_each(|total, mut target, source, &weight| {
                        target.scaled_add(weight, &source);
                        *total += weight;
                    });
            }
        }

        self.patches_applied += 1;
        Ok(())
    }

    /// Fold another accumulator for the same image into this one
    ///
    /// Weighted accumulators add; overwrite accumulators keep, per pixel, the
    /// contribution with the higher precedence stamp. Both are independent of
    /// the order partial accumulators are merged in.
    ///
    /// # Errors
    ///
    /// Returns an error if the canvases, class counts or blend modes differ
    pub fn merge(&mut self, other: Self) -> Result<()> {
        if self.scores.dim() != other.scores.dim() || self.patch_size != other.patch_size {
            let (height, width, classes) = other.scores.dim();
            return Err(invalid_parameter(
                "stitcher",
                &format!("{height}x{width}x{classes}"),
                &"cannot merge accumulators of different shapes",
            ));
        }

        let own_mode = self.blend_mode();
        match (&mut self.accumulation, other.accumulation) {
            (
                Accumulation::Overwrite { precedence },
                Accumulation::Overwrite {
                    precedence: other_precedence,
                },
            ) => {
                Zip::from(precedence)
                    .and(self.scores.lanes_mut(Axis(2)))
                    .and(&other_precedence)
                    .and(other.scores.lanes(Axis(2)))
                    .for_each(|current, mut target, &incoming, source| {
                        if incoming > *current {
                            *current = incoming;
                            target.assign(&source);
                        }
                    });
            }
            (
                Accumulation::Weighted { weights, .. },
                Accumulation::Weighted {
                    weights: other_weights,
                    ..
                },
            ) => {
                *weights += &other_weights;
                self.scores += &other.scores;
            }
            (_, other_accumulation) => {
                let other_mode = match other_accumulation {
                    Accumulation::Overwrite { .. } => BlendMode::Overwrite,
                    Accumulation::Weighted { .. } => BlendMode::Weighted,
                };
                return Err(invalid_parameter(
                    "blend_mode",
                    &other_mode,
                    &format!("cannot merge into a {own_mode} accumulator"),
                ));
            }
        }

        self.patches_applied += other.patches_applied;
        Ok(())
    }

    /// Per-pixel class scores after weight normalisation
    ///
    /// # Errors
    ///
    /// Returns `UncoveredPixel` for the first pixel no prediction reached
    pub fn into_scores(self) -> Result<Array3<f32>> {
        let mut scores = self.scores;
        match &self.accumulation {
            Accumulation::Overwrite { precedence } => {
                if let Some(((row, col), _)) =
                    precedence.indexed_iter().find(|(_, stamp)| **stamp == 0)
                {
                    return Err(TilingError::UncoveredPixel { row, col });
                }
            }
            Accumulation::Weighted { weights, .. } => {
                if let Some(((row, col), _)) =
                    weights.indexed_iter().find(|(_, total)| **total <= 0.0)
                {
                    return Err(TilingError::UncoveredPixel { row, col });
                }
                Zip::from(scores.lanes_mut(Axis(2)))
                    .and(weights)
                    .for_each(|mut pixel, &total| pixel.mapv_inplace(|score| score / total));
            }
        }
        Ok(scores)
    }

    /// Collapse the accumulator into a label map
    ///
    /// # Errors
    ///
    /// Returns `UncoveredPixel` if some pixel received no prediction
    pub fn finish(self) -> Result<ClassLabelMap> {
        let scores = self.into_scores()?;
        Ok(ClassLabelMap::from_scores(scores.view()))
    }
}

/// Reconstruct a label map from tagged predictions
///
/// # Errors
///
/// Returns the first error raised while accumulating or finishing; no partial
/// label map is ever returned
pub fn reconstruct<I>(
    image_height: usize,
    image_width: usize,
    predictions: I,
    config: &TilingConfig,
) -> Result<ClassLabelMap>
where
    I: IntoIterator<Item = PatchPrediction>,
{
    let mut stitcher = Stitcher::new(image_height, image_width, config)?;
    for prediction in predictions {
        stitcher.add(&prediction)?;
    }
    stitcher.finish()
}
