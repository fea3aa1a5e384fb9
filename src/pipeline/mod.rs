/// Per-image segmentation from photograph to label map
pub mod segmenter;

pub use segmenter::Segmenter;
