//! Error types and context management for tiling, inference and stitching

use crate::geometry::grid::Origin;
use std::fmt;
use std::path::PathBuf;

/// Boxed error returned by external segmentation models
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for all engine operations
#[derive(Debug)]
pub enum TilingError {
    /// Failed to load source image from filesystem
    ImageLoad {
        /// Path to the image file
        path: PathBuf,
        /// Underlying image loading error
        source: image::ImageError,
    },

    /// Failed to save an image to disk
    ImageExport {
        /// Path where export was attempted
        path: PathBuf,
        /// Underlying image export error
        source: image::ImageError,
    },

    /// General file system operation failure
    FileSystem {
        /// Path involved in the operation
        path: PathBuf,
        /// Description of the operation that failed
        operation: &'static str,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Reading or writing a delimited bookkeeping file failed
    Csv {
        /// Path of the delimited file
        path: PathBuf,
        /// Underlying CSV error
        source: csv::Error,
    },

    /// A bookkeeping row could not be interpreted
    MalformedRecord {
        /// Path of the delimited file
        path: PathBuf,
        /// One-based line of the offending row
        line: u64,
        /// Description of what's wrong with the row
        reason: String,
    },

    /// Configuration parameter validation failed
    InvalidParameter {
        /// Name of the invalid parameter
        parameter: &'static str,
        /// Provided value that failed validation
        value: String,
        /// Explanation of why the value is invalid
        reason: String,
    },

    /// Image is smaller than one patch in at least one dimension
    ImageTooSmall {
        /// Image height in pixels
        image_height: usize,
        /// Image width in pixels
        image_width: usize,
        /// Requested patch side length
        patch_size: usize,
    },

    /// Patch walk and stride formula disagree
    ///
    /// Indicates an off-by-one in the walk bounds; never corrected silently.
    GeometryInconsistency {
        /// Patch group whose count disagrees
        group: &'static str,
        /// Count derived from the stride formula
        expected: usize,
        /// Count produced by the walk
        actual: usize,
    },

    /// Patch origin plus patch size exceeds the canvas
    PatchOutOfBounds {
        /// Declared origin of the patch
        origin: Origin,
        /// Patch side length
        patch_size: usize,
        /// Canvas dimensions (height, width)
        canvas: (usize, usize),
    },

    /// Prediction class dimension disagrees with the accumulator
    ClassCountMismatch {
        /// Class count of the accumulator
        expected: usize,
        /// Class count found in the prediction
        actual: usize,
    },

    /// Prediction spatial shape disagrees with the patch size
    PatchShapeMismatch {
        /// Expected (height, width)
        expected: (usize, usize),
        /// Received (height, width)
        actual: (usize, usize),
    },

    /// A canvas pixel received no patch contribution
    UncoveredPixel {
        /// Row of the first uncovered pixel
        row: usize,
        /// Column of the first uncovered pixel
        col: usize,
    },

    /// Model output does not line up with the submitted batch
    BatchShapeMismatch {
        /// Expected output shape
        expected: Vec<usize>,
        /// Shape returned by the model
        actual: Vec<usize>,
    },

    /// The external model failed; propagated unchanged
    Inference {
        /// Index of the batch that failed
        batch: usize,
        /// Error reported by the model
        source: BoxError,
    },

    /// Logger could not be started
    Logging {
        /// Description of the failure
        reason: String,
    },
}

impl TilingError {
    /// Whether the error belongs to the reconstruction family
    pub const fn is_reconstruction_error(&self) -> bool {
        matches!(
            self,
            Self::PatchOutOfBounds { .. }
                | Self::ClassCountMismatch { .. }
                | Self::PatchShapeMismatch { .. }
                | Self::UncoveredPixel { .. }
        )
    }

    /// Whether the error belongs to the geometry family
    pub const fn is_geometry_error(&self) -> bool {
        matches!(
            self,
            Self::ImageTooSmall { .. } | Self::GeometryInconsistency { .. }
        )
    }
}

impl fmt::Display for TilingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageLoad { path, source } => {
                write!(f, "Failed to load image '{}': {source}", path.display())
            }
            Self::ImageExport { path, source } => {
                write!(
                    f,
                    "Failed to export image to '{}': {source}",
                    path.display()
                )
            }
            Self::FileSystem {
                path,
                operation,
                source,
            } => {
                write!(
                    f,
                    "File system error during {operation} on '{}': {source}",
                    path.display()
                )
            }
            Self::Csv { path, source } => {
                write!(f, "CSV error on '{}': {source}", path.display())
            }
            Self::MalformedRecord { path, line, reason } => {
                write!(
                    f,
                    "Malformed record at line {line} of '{}': {reason}",
                    path.display()
                )
            }
            Self::InvalidParameter {
                parameter,
                value,
                reason,
            } => {
                write!(f, "Invalid parameter '{parameter}' = '{value}': {reason}")
            }
            Self::ImageTooSmall {
                image_height,
                image_width,
                patch_size,
            } => {
                write!(
                    f,
                    "Image of size {image_height}x{image_width} is smaller than one {patch_size}x{patch_size} patch"
                )
            }
            Self::GeometryInconsistency {
                group,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Inconsistent {group} patch count: stride formula gives {expected}, walk produced {actual}"
                )
            }
            Self::PatchOutOfBounds {
                origin,
                patch_size,
                canvas,
            } => {
                write!(
                    f,
                    "Patch at ({}, {}) of size {patch_size} exceeds canvas {}x{}",
                    origin.row, origin.col, canvas.0, canvas.1
                )
            }
            Self::ClassCountMismatch { expected, actual } => {
                write!(
                    f,
                    "Prediction has {actual} classes but the accumulator holds {expected}"
                )
            }
            Self::PatchShapeMismatch { expected, actual } => {
                write!(
                    f,
                    "Prediction of size {}x{} does not match patch size {}x{}",
                    actual.0, actual.1, expected.0, expected.1
                )
            }
            Self::UncoveredPixel { row, col } => {
                write!(f, "Pixel ({row}, {col}) received no patch contribution")
            }
            Self::BatchShapeMismatch { expected, actual } => {
                write!(
                    f,
                    "Model returned shape {actual:?}, expected {expected:?}"
                )
            }
            Self::Inference { batch, source } => {
                write!(f, "Model inference failed on batch {batch}: {source}")
            }
            Self::Logging { reason } => {
                write!(f, "Logger initialization failed: {reason}")
            }
        }
    }
}

impl std::error::Error for TilingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ImageLoad { source, .. } | Self::ImageExport { source, .. } => Some(source),
            Self::FileSystem { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            Self::Inference { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Convenience type alias for engine results
pub type Result<T> = std::result::Result<T, TilingError>;

/// Additional context to enrich error messages
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// File the failing operation was working on
    pub path: Option<PathBuf>,
    /// Operation being performed
    pub operation: Option<&'static str>,
}

/// Enriches errors converted without location information
pub trait WithContext<T> {
    /// Add error context to a Result
    ///
    /// # Errors
    ///
    /// Propagates the original error with additional context applied
    fn with_context(self, context: ErrorContext) -> Result<T>;

    /// Attach the path of the file being processed
    ///
    /// # Errors
    ///
    /// Propagates the original error with the path applied
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Attach both the path and the operation
    ///
    /// # Errors
    ///
    /// Propagates the original error with path and operation applied
    fn with_file_operation(self, path: impl Into<PathBuf>, operation: &'static str)
    -> Result<T>;
}

impl<T, E> WithContext<T> for std::result::Result<T, E>
where
    E: Into<TilingError>,
{
    fn with_context(self, context: ErrorContext) -> Result<T> {
        self.map_err(|e| {
            let mut error = e.into();
            // Only conversions that lost their location benefit from context
            match &mut error {
                TilingError::ImageLoad { path, .. }
                | TilingError::ImageExport { path, .. }
                | TilingError::Csv { path, .. } => {
                    if let Some(context_path) = &context.path {
                        path.clone_from(context_path);
                    }
                }
                TilingError::FileSystem {
                    path, operation, ..
                } => {
                    if let Some(context_path) = &context.path {
                        path.clone_from(context_path);
                    }
                    if let Some(context_operation) = context.operation {
                        *operation = context_operation;
                    }
                }
                _ => {}
            }
            error
        })
    }

    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.with_context(ErrorContext {
            path: Some(path.into()),
            ..Default::default()
        })
    }

    fn with_file_operation(
        self,
        path: impl Into<PathBuf>,
        operation: &'static str,
    ) -> Result<T> {
        self.with_context(ErrorContext {
            path: Some(path.into()),
            operation: Some(operation),
        })
    }
}

impl From<image::ImageError> for TilingError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageLoad {
            path: PathBuf::from("<unknown>"),
            source: err,
        }
    }
}

impl From<std::io::Error> for TilingError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("<unknown>"),
            operation: "unknown",
            source: err,
        }
    }
}

impl From<csv::Error> for TilingError {
    fn from(err: csv::Error) -> Self {
        Self::Csv {
            path: PathBuf::from("<unknown>"),
            source: err,
        }
    }
}

/// Create an invalid parameter error
pub fn invalid_parameter(
    parameter: &'static str,
    value: &impl ToString,
    reason: &impl ToString,
) -> TilingError {
    TilingError::InvalidParameter {
        parameter,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Create an invalid path error
pub fn path_error(path: &std::path::Path, reason: &str) -> TilingError {
    TilingError::InvalidParameter {
        parameter: "path",
        value: path.display().to_string(),
        reason: reason.to_string(),
    }
}
