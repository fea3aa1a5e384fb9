//! Tests for whole-photograph segmentation

#[cfg(test)]
mod tests {
    use ndarray::{Array3, Array4, ArrayView4, s};
    use patchstitch::TilingError;
    use patchstitch::inference::model::NearestColorModel;
    use patchstitch::io::configuration::{BlendMode, TilingConfig};
    use patchstitch::io::error::BoxError;
    use patchstitch::io::palette::ClassPalette;
    use patchstitch::pipeline::Segmenter;

    fn config(patch_size: usize, overlap: usize, batch_size: usize, n_classes: usize) -> TilingConfig {
        TilingConfig {
            patch_size,
            overlap,
            batch_size,
            n_classes,
            ..TilingConfig::default()
        }
    }

    // Model scoring class 2 highest everywhere
    fn uniform_model(
        n_classes: usize,
    ) -> impl FnMut(ArrayView4<'_, f32>) -> Result<Array4<f32>, BoxError> {
        move |batch: ArrayView4<'_, f32>| {
            let (count, height, width, _) = batch.dim();
            let mut scores = Array4::<f32>::zeros((count, height, width, n_classes));
            scores.slice_mut(s![.., .., .., 2]).fill(1.0);
            Ok(scores)
        }
    }

    // Tests a constant prediction yields a constant label map in both modes
    // Verified by leaving edge patches out of the stitch
    #[test]
    fn test_uniform_class_both_modes() {
        let image = Array3::<u8>::zeros((37, 53, 3));
        for blend_mode in [BlendMode::Overwrite, BlendMode::Weighted] {
            let config = TilingConfig {
                blend_mode,
                ..config(16, 4, 5, 4)
            };
            let mut segmenter = Segmenter::new(uniform_model(4), config).expect("segmenter");
            let labels = segmenter.segment(image.view()).expect("labels");

            assert_eq!((labels.height(), labels.width()), (37, 53));
            assert!(labels.labels().iter().all(|&class| class == 2), "{blend_mode}");
        }
    }

    // Tests a palette-rendered photograph is reproduced exactly
    // Verified by flipping row and column when stitching
    #[test]
    fn test_nearest_color_reproduces_palette_image() {
        let palette = ClassPalette::default();
        let classes = Array3::from_shape_fn((45, 70, 1), |(row, col, _)| ((row / 9 + col / 11) % 10) as u8);
        let image = Array3::from_shape_fn((45, 70, 3), |(row, col, channel)| {
            palette.color(classes[(row, col, 0)])[channel]
        });

        let model = NearestColorModel::new(&palette.colors());
        let mut segmenter =
            Segmenter::new(model, config(16, 5, 3, palette.len())).expect("segmenter");
        let labels = segmenter.segment(image.view()).expect("labels");

        assert_eq!(labels.labels(), classes.index_axis(ndarray::Axis(2), 0));
    }

    // Tests alpha channels are ignored
    // Verified by passing four channels to the model
    #[test]
    fn test_alpha_channel_ignored() {
        let image = Array3::<u8>::from_elem((20, 20, 4), 200);
        let mut calls = 0;
        let model = |batch: ArrayView4<'_, f32>| -> Result<Array4<f32>, BoxError> {
            calls += 1;
            assert_eq!(batch.dim().3, 3);
            let (count, height, width, _) = batch.dim();
            Ok(Array4::zeros((count, height, width, 2)))
        };
        let mut segmenter = Segmenter::new(model, config(16, 4, 8, 2)).expect("segmenter");
        segmenter.segment(image.view()).expect("labels");
        drop(segmenter);
        assert!(calls > 0);
    }

    // Tests grayscale input is rejected
    // Verified by broadcasting a single channel
    #[test]
    fn test_grayscale_rejected() {
        let image = Array3::<u8>::zeros((20, 20, 1));
        let mut segmenter = Segmenter::new(uniform_model(3), config(16, 4, 8, 3)).expect("segmenter");
        assert!(matches!(
            segmenter.segment(image.view()),
            Err(TilingError::InvalidParameter { parameter: "image", .. })
        ));
    }

    // Tests images smaller than one patch are rejected
    // Verified by padding small images
    #[test]
    fn test_image_too_small() {
        let image = Array3::<u8>::zeros((10, 40, 3));
        let mut segmenter = Segmenter::new(uniform_model(3), config(16, 4, 8, 3)).expect("segmenter");
        assert!(matches!(
            segmenter.segment(image.view()),
            Err(TilingError::ImageTooSmall { .. })
        ));
        assert!(segmenter.total_batches(10, 40).is_err());
    }

    // Tests progress reports every batch and ends at the total
    // Verified by reporting patches instead of batches
    #[test]
    fn test_progress_callback() {
        let image = Array3::<u8>::zeros((660, 920, 3));
        let mut segmenter =
            Segmenter::new(uniform_model(3), config(256, 40, 4, 3)).expect("segmenter");
        assert_eq!(segmenter.total_batches(660, 920).expect("batches"), 4);

        let mut reports = Vec::new();
        segmenter
            .segment_with_progress(image.view(), |done, total| reports.push((done, total)))
            .expect("labels");
        assert_eq!(reports, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    }

    // Tests model failures propagate with the batch number
    // Verified by swallowing model errors
    #[test]
    fn test_model_failure() {
        let image = Array3::<u8>::zeros((40, 40, 3));
        let mut calls = 0;
        let model = move |batch: ArrayView4<'_, f32>| -> Result<Array4<f32>, BoxError> {
            calls += 1;
            if calls == 2 {
                return Err("device lost".into());
            }
            let (count, height, width, _) = batch.dim();
            Ok(Array4::zeros((count, height, width, 3)))
        };
        let mut segmenter = Segmenter::new(model, config(16, 4, 2, 3)).expect("segmenter");
        assert!(matches!(
            segmenter.segment(image.view()),
            Err(TilingError::Inference { .. })
        ));
    }

    // Tests wrong class counts from the model are rejected
    // Verified by truncating scores to the configured class count
    #[test]
    fn test_class_count_mismatch() {
        let image = Array3::<u8>::zeros((20, 20, 3));
        let mut segmenter = Segmenter::new(uniform_model(5), config(16, 4, 8, 3)).expect("segmenter");
        assert!(segmenter.segment(image.view()).is_err());
    }

    // Tests invalid configurations are refused up front
    // Verified by validating lazily on first segment
    #[test]
    fn test_invalid_config() {
        assert!(Segmenter::new(uniform_model(3), config(16, 16, 8, 3)).is_err());
        let segmenter = Segmenter::new(uniform_model(3), config(16, 4, 8, 3)).expect("segmenter");
        assert_eq!(segmenter.config().patch_size, 16);
    }
}
