//! Multi-file progress tracking for parallel segmentation runs

use crate::io::configuration::MAX_INDIVIDUAL_PROGRESS_BARS;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::Path;
use std::sync::LazyLock;

static BATCH_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_bar()
        .template("{prefix} [{bar:30.cyan/blue}] {pos}/{len} batches")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏ ")
});

static FILES_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] Files: [{bar:40.cyan/blue}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
});

/// Coordinates progress display across worker threads
///
/// Each file in flight gets its own bar counting inference batches; bars are
/// removed once their file completes. Large runs also get an overall files
/// bar. All methods take `&self`, so one manager is shared by every worker.
pub struct ProgressManager {
    multi_progress: MultiProgress,
    files_bar: Option<ProgressBar>,
}

impl ProgressManager {
    /// Create a manager drawing to stderr for `file_count` files
    pub fn new(file_count: usize) -> Self {
        Self::with_draw_target(file_count, ProgressDrawTarget::stderr())
    }

    /// Create a manager that draws nothing
    pub fn hidden(file_count: usize) -> Self {
        Self::with_draw_target(file_count, ProgressDrawTarget::hidden())
    }

    fn with_draw_target(file_count: usize, target: ProgressDrawTarget) -> Self {
        let multi_progress = MultiProgress::with_draw_target(target);

        // Only worth a summary bar once per-file bars start scrolling away
        let files_bar = (file_count > MAX_INDIVIDUAL_PROGRESS_BARS + 1).then(|| {
            let bar = ProgressBar::new(file_count as u64);
            bar.set_style(FILES_STYLE.clone());
            multi_progress.add(bar)
        });

        Self {
            multi_progress,
            files_bar,
        }
    }

    /// Whether the overall files bar is shown
    pub const fn has_files_bar(&self) -> bool {
        self.files_bar.is_some()
    }

    /// Files completed so far, if the files bar is shown
    pub fn files_completed(&self) -> Option<u64> {
        self.files_bar.as_ref().map(ProgressBar::position)
    }

    /// Add a bar for a file about to be segmented in `total_batches` batches
    pub fn start_file(&self, path: &Path, total_batches: usize) -> ProgressBar {
        let display_name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let bar = ProgressBar::new(total_batches as u64);
        bar.set_style(BATCH_STYLE.clone());
        bar.set_prefix(display_name);
        self.multi_progress.add(bar)
    }

    /// Remove a file's bar and count it as done
    pub fn complete_file(&self, bar: &ProgressBar) {
        bar.finish();
        self.multi_progress.remove(bar);
        if let Some(files_bar) = &self.files_bar {
            files_bar.inc(1);
        }
    }

    /// Clean up all progress displays
    pub fn finish(&self) {
        if let Some(files_bar) = &self.files_bar {
            files_bar.finish_with_message("All files processed");
        }
        let _ = self.multi_progress.clear();
    }
}
