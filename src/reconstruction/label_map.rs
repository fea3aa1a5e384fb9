//! Full-resolution class label maps

use crate::io::configuration::{MASK_FALSE_VALUE, MASK_TRUE_VALUE};
use ndarray::{Array2, ArrayView2, ArrayView3, Axis};

/// Index of the largest score, ties resolved towards the lowest index
///
/// NaN scores never win. Returns zero for an empty sequence.
pub fn stable_argmax(scores: impl IntoIterator<Item = f32>) -> usize {
    let mut best_index = 0;
    let mut best_score = f32::NEG_INFINITY;
    for (index, score) in scores.into_iter().enumerate() {
        if score > best_score {
            best_index = index;
            best_score = score;
        }
    }
    best_index
}

/// One class id per pixel of the source image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabelMap {
    labels: Array2<u8>,
}

impl ClassLabelMap {
    /// Wrap an existing label array
    pub const fn new(labels: Array2<u8>) -> Self {
        Self { labels }
    }

    /// Collapse `(height, width, n_classes)` scores into labels
    pub fn from_scores(scores: ArrayView3<'_, f32>) -> Self {
        let labels = scores.map_axis(Axis(2), |pixel| stable_argmax(pixel.iter().copied()) as u8);
        Self { labels }
    }

    /// Height in pixels
    pub fn height(&self) -> usize {
        self.labels.dim().0
    }

    /// Width in pixels
    pub fn width(&self) -> usize {
        self.labels.dim().1
    }

    /// Borrow the label array
    pub fn labels(&self) -> ArrayView2<'_, u8> {
        self.labels.view()
    }

    /// Consume the map and return the label array
    pub fn into_inner(self) -> Array2<u8> {
        self.labels
    }

    /// Class id at a pixel, `None` outside the map
    pub fn get(&self, row: usize, col: usize) -> Option<u8> {
        self.labels.get((row, col)).copied()
    }

    /// Pixel count per class id; ids at or above `n_classes` are not counted
    pub fn class_histogram(&self, n_classes: usize) -> Vec<usize> {
        let mut counts = vec![0; n_classes];
        for &label in &self.labels {
            if let Some(count) = counts.get_mut(usize::from(label)) {
                *count += 1;
            }
        }
        counts
    }

    /// Binary mask of one class using the mask true/false values
    pub fn binary_mask(&self, class_id: u8) -> Array2<u8> {
        self.labels.mapv(|label| {
            if label == class_id {
                MASK_TRUE_VALUE
            } else {
                MASK_FALSE_VALUE
            }
        })
    }
}
