//! End-to-end segmentation of one photograph
//!
//! The grid is walked lazily: patches are copied out one at a time, grouped
//! into batches for the model, and every prediction is folded into the
//! accumulator as soon as it comes back. At most one batch of patches and
//! predictions is alive at any moment.

use crate::extraction::patches::{PatchStream, color_channels};
use crate::geometry::grid::PatchGrid;
use crate::inference::batch::{BatchRunner, batch_count};
use crate::inference::model::SegmentationModel;
use crate::io::configuration::{MODEL_CHANNELS, TilingConfig};
use crate::io::error::{Result, invalid_parameter};
use crate::reconstruction::label_map::ClassLabelMap;
use crate::reconstruction::stitcher::Stitcher;
use log::debug;
use ndarray::ArrayView3;

/// Segments whole photographs with a patch-wise model
pub struct Segmenter<M> {
    model: M,
    config: TilingConfig,
}

impl<M: SegmentationModel> Segmenter<M> {
    /// Pair a model with a validated configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid
    pub fn new(model: M, config: TilingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { model, config })
    }

    /// Configuration in use
    pub const fn config(&self) -> &TilingConfig {
        &self.config
    }

    /// Release the model
    pub fn into_model(self) -> M {
        self.model
    }

    /// Model calls needed for an image of the given size
    ///
    /// # Errors
    ///
    /// Returns an error if the image is smaller than one patch
    pub fn total_batches(&self, image_height: usize, image_width: usize) -> Result<usize> {
        let grid = PatchGrid::from_config(image_height, image_width, &self.config)?;
        Ok(batch_count(grid.len(), self.config.batch_size))
    }

    /// Segment an `(height, width, channels)` photograph
    ///
    /// An alpha channel, if present, is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the image is too small or lacks colour channels,
    /// the model fails or returns malformed scores, or some pixel is left
    /// without a prediction
    pub fn segment(&mut self, image: ArrayView3<'_, u8>) -> Result<ClassLabelMap> {
        self.segment_with_progress(image, |_, _| {})
    }

    /// Segment a photograph, reporting `(batches done, total batches)`
    ///
    /// # Errors
    ///
    /// Same as [`Segmenter::segment`]
    pub fn segment_with_progress<F>(
        &mut self,
        image: ArrayView3<'_, u8>,
        mut progress: F,
    ) -> Result<ClassLabelMap>
    where
        F: FnMut(usize, usize),
    {
        let image = color_channels(image, true);
        let (height, width, channels) = image.dim();
        if channels != MODEL_CHANNELS {
            return Err(invalid_parameter(
                "image",
                &format!("{height}x{width}x{channels}"),
                &format!("expected {MODEL_CHANNELS} colour channels"),
            ));
        }

        let grid = PatchGrid::from_config(height, width, &self.config)?;
        let batch_size = self.config.batch_size;
        let n_patches = grid.len();
        let total_batches = batch_count(n_patches, batch_size);
        let patches = PatchStream::new(image, &grid)?;
        let mut stitcher = Stitcher::new(height, width, &self.config)?;
        let mut runner = BatchRunner::new(&mut self.model, batch_size)?;

        debug!("Segmenting {height}x{width} image: {n_patches} patches in {total_batches} batches");

        let mut received: usize = 0;
        runner.run(patches, |prediction| {
            stitcher.add(&prediction)?;
            received += 1;
            if received.is_multiple_of(batch_size) || received == n_patches {
                progress(received.div_ceil(batch_size), total_batches);
            }
            Ok(())
        })?;

        stitcher.finish()
    }
}
