//! Two-column CSV cache of patch coverage percentages
//!
//! Coverage is expensive to compute over a full patch tree, so results are
//! cached between runs as headerless `path,percent` rows.

use crate::io::error::{Result, TilingError, WithContext, path_error};
use log::info;
use std::collections::BTreeMap;
use std::path::Path;

fn require_csv_extension(path: &Path) -> Result<()> {
    if path.extension().and_then(|ext| ext.to_str()) == Some("csv") {
        Ok(())
    } else {
        Err(path_error(path, "coverage cache must be a .csv file"))
    }
}

/// Coverage percentages keyed by patch identifier
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageCache {
    entries: BTreeMap<String, f64>,
}

impl CoverageCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a cache file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path does not end in `.csv`
    /// - The file cannot be read
    /// - A row does not have exactly two columns or its percentage is not a
    ///   number in `[0, 100]`
    pub fn load(path: &Path) -> Result<Self> {
        require_csv_extension(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .with_path(path)?;

        let mut entries = BTreeMap::new();
        for (index, row) in reader.records().enumerate() {
            let record = row.with_path(path)?;
            let line = record
                .position()
                .map_or(index as u64 + 1, csv::Position::line);
            let malformed = |reason: String| TilingError::MalformedRecord {
                path: path.to_path_buf(),
                line,
                reason,
            };

            if record.len() != 2 {
                return Err(malformed(format!(
                    "expected 2 columns, found {}",
                    record.len()
                )));
            }
            let (Some(key), Some(raw_percent)) = (record.get(0), record.get(1)) else {
                return Err(malformed("missing column".to_string()));
            };
            let percent: f64 = raw_percent
                .trim()
                .parse()
                .map_err(|e| malformed(format!("'{raw_percent}' is not a number: {e}")))?;
            if !(0.0..=100.0).contains(&percent) {
                return Err(malformed(format!("{percent} is not a percentage")));
            }
            entries.insert(key.to_string(), percent);
        }

        info!(
            "Loaded {} cached coverage values from {}",
            entries.len(),
            path.display()
        );
        Ok(Self { entries })
    }

    /// Load a cache file if it exists, otherwise start empty
    ///
    /// # Errors
    ///
    /// Same as [`CoverageCache::load`] when the file exists
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            require_csv_extension(path)?;
            Ok(Self::new())
        }
    }

    /// Write every entry as a `path,percent` row, sorted by path
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not end in `.csv` or cannot be written
    pub fn save(&self, path: &Path) -> Result<()> {
        require_csv_extension(path)?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_file_operation(parent, "create directory")?;
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .with_path(path)?;
        for (key, percent) in &self.entries {
            writer
                .write_record([key.as_str(), percent.to_string().as_str()])
                .with_path(path)?;
        }
        writer.flush().with_file_operation(path, "flush")?;
        Ok(())
    }

    /// Cached coverage of a patch
    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries.get(key).copied()
    }

    /// Record the coverage of a patch
    pub fn insert(&mut self, key: impl Into<String>, percent: f64) {
        self.entries.insert(key.into(), percent);
    }

    /// Cached value or the result of `compute`, which is then cached
    ///
    /// # Errors
    ///
    /// Propagates errors from `compute`
    pub fn get_or_compute<F>(&mut self, key: &str, compute: F) -> Result<f64>
    where
        F: FnOnce() -> Result<f64>,
    {
        if let Some(percent) = self.get(key) {
            return Ok(percent);
        }
        let percent = compute()?;
        self.insert(key, percent);
        Ok(percent)
    }

    /// Number of cached patches
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entry
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by patch identifier
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(key, &percent)| (key.as_str(), percent))
    }
}
