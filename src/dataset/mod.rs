//! Training-patch curation: coverage filtering and its bookkeeping

/// Coverage percentage, mask stacking and the coverage filter
pub mod coverage;
/// CSV cache of computed coverage values
pub mod coverage_cache;

pub use coverage::{CoverageFilter, PatchVerdict, coverage_percent};
pub use coverage_cache::CoverageCache;
