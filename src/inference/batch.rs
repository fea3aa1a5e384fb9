//! Batched inference over tagged patches
//!
//! Groups patches into fixed-size batches, calls the model once per batch and
//! hands back one prediction per patch carrying the patch's tag. Consumers can
//! therefore place predictions without relying on submission order.

use crate::extraction::patches::Patch;
use crate::geometry::grid::{Origin, PatchTag};
use crate::inference::model::SegmentationModel;
use crate::io::configuration::MODEL_CHANNELS;
use crate::io::error::{Result, TilingError, invalid_parameter};
use log::debug;
use ndarray::{Array3, Array4, Axis};

/// Class scores predicted for one patch
#[derive(Debug, Clone, PartialEq)]
pub struct PatchPrediction {
    /// Tag of the patch the scores belong to
    pub tag: PatchTag,
    /// Scores, `(patch_size, patch_size, n_classes)`
    pub scores: Array3<f32>,
}

impl PatchPrediction {
    /// Top-left corner of the predicted patch
    pub const fn origin(&self) -> Origin {
        self.tag.origin
    }

    /// Number of classes in the prediction
    pub fn n_classes(&self) -> usize {
        self.scores.dim().2
    }
}

/// Number of model calls needed for `n_patches`
pub const fn batch_count(n_patches: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    n_patches.div_ceil(batch_size)
}

/// Stack colour patches into a normalised model input
///
/// # Errors
///
/// Returns an error if:
/// - `patches` is empty
/// - A patch is not square, not three-channel, or differs in size from the first
pub fn patches_to_batch(patches: &[Patch<u8>]) -> Result<Array4<f32>> {
    let first = patches
        .first()
        .ok_or_else(|| invalid_parameter("batch", &0, &"must contain at least one patch"))?;
    let expected = (first.size(), first.size(), MODEL_CHANNELS);

    let mut batch = Array4::<f32>::zeros((patches.len(), expected.0, expected.1, expected.2));
    for (mut slot, patch) in batch.outer_iter_mut().zip(patches) {
        if patch.data.dim() != expected {
            let (height, width, channels) = patch.data.dim();
            return Err(invalid_parameter(
                "patch",
                &format!("{height}x{width}x{channels}"),
                &format!(
                    "expected {}x{}x{} at origin ({}, {})",
                    expected.0,
                    expected.1,
                    expected.2,
                    patch.origin().row,
                    patch.origin().col
                ),
            ));
        }
        slot.zip_mut_with(&patch.data, |dst, &src| *dst = f32::from(src) / 255.0);
    }

    Ok(batch)
}

/// Drives a model over a patch sequence one batch at a time
pub struct BatchRunner<'m, M: ?Sized> {
    model: &'m mut M,
    batch_size: usize,
    batches_run: usize,
}

impl<'m, M: SegmentationModel + ?Sized> BatchRunner<'m, M> {
    /// Create a runner submitting `batch_size` patches per model call
    ///
    /// # Errors
    ///
    /// Returns an error if `batch_size` is zero
    pub fn new(model: &'m mut M, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(invalid_parameter(
                "batch_size",
                &batch_size,
                &"must be positive",
            ));
        }
        Ok(Self {
            model,
            batch_size,
            batches_run: 0,
        })
    }

    /// Configured patches per model call
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Model calls made so far
    pub const fn batches_run(&self) -> usize {
        self.batches_run
    }

    /// Run the model on one batch and pair each output with its patch tag
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The patches cannot be stacked into a batch
    /// - The model fails (propagated as `Inference`)
    /// - The model output does not have one patch-sized map per input patch
    pub fn predict_batch(&mut self, patches: Vec<Patch<u8>>) -> Result<Vec<PatchPrediction>> {
        let input = patches_to_batch(&patches)?;
        let batch_index = self.batches_run;
        self.batches_run += 1;

        debug!("Submitting batch {batch_index} of {} patches", patches.len());

        let output = self
            .model
            .predict(input.view())
            .map_err(|source| TilingError::Inference {
                batch: batch_index,
                source,
            })?;

        let (count, height, width, _) = input.dim();
        let (out_count, out_height, out_width, n_classes) = output.dim();
        if (out_count, out_height, out_width) != (count, height, width) {
            return Err(TilingError::BatchShapeMismatch {
                expected: vec![count, height, width, n_classes],
                actual: output.shape().to_vec(),
            });
        }

        Ok(output
            .axis_iter(Axis(0))
            .zip(patches)
            .map(|(scores, patch)| PatchPrediction {
                tag: patch.tag,
                scores: scores.to_owned(),
            })
            .collect())
    }

    /// Stream patches through the model, passing each prediction to `sink`
    ///
    /// At most one batch of patches and predictions is held at a time. The
    /// final batch may be smaller than the configured size.
    ///
    /// # Errors
    ///
    /// Returns the first error from the patch source, the model or the sink
    pub fn run<I, F>(&mut self, patches: I, mut sink: F) -> Result<usize>
    where
        I: IntoIterator<Item = Result<Patch<u8>>>,
        F: FnMut(PatchPrediction) -> Result<()>,
    {
        let mut pending = Vec::with_capacity(self.batch_size);
        let mut predicted = 0;

        for patch in patches {
            pending.push(patch?);
            if pending.len() == self.batch_size {
                for prediction in self.predict_batch(std::mem::take(&mut pending))? {
                    sink(prediction)?;
                    predicted += 1;
                }
            }
        }

        if !pending.is_empty() {
            for prediction in self.predict_batch(pending)? {
                sink(prediction)?;
                predicted += 1;
            }
        }

        Ok(predicted)
    }

    /// Predict every patch and collect the tagged outputs in input order
    ///
    /// # Errors
    ///
    /// Same as [`BatchRunner::run`]
    pub fn predict_all<I>(&mut self, patches: I) -> Result<Vec<PatchPrediction>>
    where
        I: IntoIterator<Item = Patch<u8>>,
    {
        let mut predictions = Vec::new();
        self.run(patches.into_iter().map(Ok), |prediction| {
            predictions.push(prediction);
            Ok(())
        })?;
        Ok(predictions)
    }
}
