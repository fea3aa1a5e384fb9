//! Tests for error types including source chaining, context and formatting

#[cfg(test)]
mod tests {
    use patchstitch::TilingError;
    use patchstitch::geometry::grid::Origin;
    use patchstitch::io::error::{WithContext, invalid_parameter, path_error};
    use std::error::Error;
    use std::path::{Path, PathBuf};

    // Tests error source chaining works correctly
    // Verified by breaking source chain
    #[test]
    fn test_error_source_chain() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = TilingError::FileSystem {
            path: "/tmp/test.png".into(),
            operation: "read",
            source: io_error,
        };
        assert!(error.source().is_some());

        let inference = TilingError::Inference {
            batch: 3,
            source: "device lost".into(),
        };
        assert_eq!(
            inference.source().map(ToString::to_string),
            Some("device lost".to_string())
        );
        assert!(
            TilingError::UncoveredPixel { row: 0, col: 0 }
                .source()
                .is_none()
        );
    }

    // Tests ImageTooSmall formatting names both sizes
    // Verified by omitting the patch size from the message
    #[test]
    fn test_image_too_small_message() {
        let message = TilingError::ImageTooSmall {
            image_height: 100,
            image_width: 300,
            patch_size: 256,
        }
        .to_string();
        assert!(message.contains("100x300"));
        assert!(message.contains("256x256"));
    }

    // Tests InvalidParameter error contains all fields
    // Verified by omitting value from message
    #[test]
    fn test_invalid_parameter_error() {
        let message = invalid_parameter("overlap", &256, &"must be smaller than patch_size").to_string();
        assert!(message.contains("overlap"));
        assert!(message.contains("256"));
        assert!(message.contains("must be smaller than patch_size"));

        let message = path_error(Path::new("data/x.txt"), "not a csv").to_string();
        assert!(message.contains("data/x.txt"));
    }

    // Tests reconstruction messages carry positions and shapes
    // Verified by swapping row and column in the message
    #[test]
    fn test_reconstruction_messages() {
        let out_of_bounds = TilingError::PatchOutOfBounds {
            origin: Origin::new(12, 34),
            patch_size: 8,
            canvas: (20, 40),
        };
        assert!(out_of_bounds.to_string().contains("(12, 34)"));
        assert!(out_of_bounds.to_string().contains("20x40"));

        let uncovered = TilingError::UncoveredPixel { row: 5, col: 7 };
        assert!(uncovered.to_string().contains("(5, 7)"));

        let classes = TilingError::ClassCountMismatch {
            expected: 10,
            actual: 3,
        };
        assert!(classes.to_string().contains("3 classes"));
    }

    // Tests family predicates group the variants
    // Verified by adding ImageTooSmall to the reconstruction family
    #[test]
    fn test_error_families() {
        assert!(TilingError::UncoveredPixel { row: 0, col: 0 }.is_reconstruction_error());
        assert!(
            TilingError::PatchShapeMismatch {
                expected: (4, 4),
                actual: (3, 4)
            }
            .is_reconstruction_error()
        );
        let too_small = TilingError::ImageTooSmall {
            image_height: 1,
            image_width: 1,
            patch_size: 2,
        };
        assert!(too_small.is_geometry_error());
        assert!(!too_small.is_reconstruction_error());
        assert!(
            TilingError::GeometryInconsistency {
                group: "main",
                expected: 2,
                actual: 3
            }
            .is_geometry_error()
        );
    }

    // Tests context back-fills the path of converted errors
    // Verified by ignoring the context path
    #[test]
    fn test_with_file_operation() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let error = result
            .with_file_operation("/data/masks", "read directory")
            .expect_err("error expected");

        match error {
            TilingError::FileSystem {
                path, operation, ..
            } => {
                assert_eq!(path, PathBuf::from("/data/masks"));
                assert_eq!(operation, "read directory");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    // Tests plain conversions use a placeholder path
    // Verified by leaving the path empty
    #[test]
    fn test_conversion_placeholder_path() {
        let error: TilingError = std::io::Error::other("boom").into();
        assert!(error.to_string().contains("<unknown>"));

        let with_path: Result<(), TilingError> =
            Err::<(), std::io::Error>(std::io::Error::other("boom")).with_path("cache.csv");
        assert!(
            with_path
                .expect_err("error expected")
                .to_string()
                .contains("cache.csv")
        );
    }

    // Tests context leaves errors without a path untouched
    // Verified by overwriting InvalidParameter values with the path
    #[test]
    fn test_context_ignores_pathless_errors() {
        let result: Result<(), TilingError> = Err(invalid_parameter("jobs", &0, &"bad"));
        let error = result.with_path("ignored").expect_err("error expected");
        assert!(!error.to_string().contains("ignored"));
    }
}
