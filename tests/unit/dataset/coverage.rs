//! Tests for coverage percentages, mask stacking and the coverage filter

#[cfg(test)]
mod tests {
    use ndarray::{Array2, array};
    use patchstitch::dataset::coverage::{
        ClassMask, CoverageFilter, CoverageSummary, PatchVerdict, coverage_percent,
        is_background_only, is_mask_pixel_set, stack_class_masks,
    };

    // Tests all-background and fully labelled masks hit the exact bounds
    // Verified by computing the percentage of background pixels
    #[test]
    fn test_coverage_bounds() {
        let background = Array2::<u8>::zeros((16, 16));
        let labelled = Array2::<u8>::from_elem((16, 16), 3);

        assert!(coverage_percent(background.view(), 0).abs() < f64::EPSILON);
        assert!((coverage_percent(labelled.view(), 0) - 100.0).abs() < f64::EPSILON);
    }

    // Tests partial coverage is the labelled share
    // Verified by dividing by the labelled count
    #[test]
    fn test_partial_coverage() {
        let mask = array![[0_u8, 1, 2, 0], [0, 0, 5, 0]];
        assert!((coverage_percent(mask.view(), 0) - 37.5).abs() < 1e-9);

        let wide = array![[7_u16, 0], [0, 0]];
        assert!((coverage_percent(wide.view(), 7) - 75.0).abs() < 1e-9);
    }

    // Tests an empty mask has no coverage
    // Verified by returning 100 for empty masks
    #[test]
    fn test_empty_mask() {
        let empty = Array2::<u8>::zeros((0, 5));
        assert!(coverage_percent(empty.view(), 0).abs() < f64::EPSILON);
    }

    // Tests background-only detection
    // Verified by checking any instead of all
    #[test]
    fn test_background_only() {
        assert!(is_background_only(Array2::<u8>::zeros((3, 3)).view(), 0));
        assert!(!is_background_only(array![[0_u8, 0], [0, 1]].view(), 0));
    }

    // Tests mask pixels are set above the midpoint
    // Verified by treating any non-zero value as set
    #[test]
    fn test_mask_pixel_threshold() {
        assert!(is_mask_pixel_set(255));
        assert!(is_mask_pixel_set(128));
        assert!(!is_mask_pixel_set(127));
        assert!(!is_mask_pixel_set(0));
    }

    // Tests stacking writes class ids with later masks winning
    // Verified by letting the first mask win overlaps
    #[test]
    fn test_stack_class_masks() {
        let sky = array![[255_u8, 255], [0, 0]];
        let water = array![[0_u8, 250], [255, 0]];
        let stacked = stack_class_masks(
            &[
                ClassMask {
                    class_id: 5,
                    mask: sky.view(),
                },
                ClassMask {
                    class_id: 8,
                    mask: water.view(),
                },
            ],
            2,
            2,
        )
        .expect("stacked");

        assert_eq!(stacked, array![[5_u8, 8], [8, 0]]);
    }

    // Tests masks of the wrong size are rejected
    // Verified by zipping masks of different shapes
    #[test]
    fn test_stack_rejects_wrong_size() {
        let mask = Array2::<u8>::zeros((3, 2));
        let masks = [ClassMask {
            class_id: 1,
            mask: mask.view(),
        }];
        assert!(stack_class_masks(&masks, 2, 2).is_err());
        assert_eq!(
            stack_class_masks(&[], 2, 3).expect("empty stack"),
            Array2::<u8>::zeros((2, 3))
        );
    }

    // Tests verdicts at and around the limit
    // Verified by keeping patches strictly above the limit only
    #[test]
    fn test_verdicts() {
        let filter = CoverageFilter::default();
        assert!((filter.limit_percent() - 75.0).abs() < f64::EPSILON);
        assert_eq!(filter.background(), 0);

        assert_eq!(filter.verdict(0.0), PatchVerdict::BackgroundOnly);
        assert_eq!(filter.verdict(10.0), PatchVerdict::LowCoverage);
        assert_eq!(filter.verdict(74.9), PatchVerdict::LowCoverage);
        assert_eq!(filter.verdict(75.0), PatchVerdict::Keep);
        assert_eq!(filter.verdict(100.0), PatchVerdict::Keep);
    }

    // Tests evaluation combines coverage and verdict
    // Verified by passing the wrong background id
    #[test]
    fn test_evaluate() {
        let filter = CoverageFilter::new(50.0, 0).expect("filter");
        let (percent, verdict) = filter.evaluate(array![[1_u8, 1], [0, 2]].view());
        assert!((percent - 75.0).abs() < 1e-9);
        assert_eq!(verdict, PatchVerdict::Keep);

        let (_, verdict) = filter.evaluate(Array2::zeros((4, 4)).view());
        assert_eq!(verdict, PatchVerdict::BackgroundOnly);
    }

    // Tests limits outside [0, 100] are refused
    // Verified by removing the range check
    #[test]
    fn test_invalid_limit() {
        assert!(CoverageFilter::new(-1.0, 0).is_err());
        assert!(CoverageFilter::new(100.5, 0).is_err());
        assert!(CoverageFilter::new(f64::NAN, 0).is_err());
    }

    // Tests the summary counts each verdict
    // Verified by counting low coverage as kept
    #[test]
    fn test_summary() {
        let mut summary = CoverageSummary::default();
        for verdict in [
            PatchVerdict::Keep,
            PatchVerdict::LowCoverage,
            PatchVerdict::LowCoverage,
            PatchVerdict::BackgroundOnly,
        ] {
            summary.record(verdict);
        }
        assert_eq!(
            summary,
            CoverageSummary {
                kept: 1,
                low_coverage: 2,
                background_only: 1
            }
        );
        assert_eq!(summary.total(), 4);
    }
}
