//! Command-line interface for batch segmentation and training data curation

use crate::dataset::coverage::{CoverageFilter, CoverageSummary, coverage_percent};
use crate::dataset::coverage_cache::CoverageCache;
use crate::inference::model::NearestColorModel;
use crate::io::configuration::{
    BACKGROUND_CLASS_ID, BlendMode, DEFAULT_BATCH_SIZE, DEFAULT_KERNEL_GAIN, DEFAULT_KERNEL_SIGMA,
    DEFAULT_KERNEL_WINDOW, DEFAULT_PATCH_OVERLAP, DEFAULT_PATCH_SIZE, IMAGE_EXTENSIONS,
    OUTPUT_SUFFIX, PATCH_COVERAGE_PERCENT_LIMIT, TilingConfig,
};
use crate::io::error::{Result, WithContext, invalid_parameter, path_error};
use crate::io::image::{downscale, export_class_masks, export_label_map, load_rgb_image};
use crate::io::palette::ClassPalette;
use crate::io::progress::ProgressManager;
use crate::io::storage::{PatchLayout, load_source_masks};
use crate::pipeline::segmenter::Segmenter;
use clap::{ArgAction, Args, Parser, Subcommand};
use log::{info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "patchstitch")]
#[command(
    author,
    version,
    about = "Segment large photographs patch by patch and curate training patches"
)]
/// Command-line arguments for the segmentation tool
pub struct Cli {
    /// Operation to run
    #[command(subcommand)]
    pub command: Command,

    /// Suppress progress and log output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log detail (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl Cli {
    /// Check if progress should be displayed
    pub const fn should_show_progress(&self) -> bool {
        !self.quiet
    }

    /// Log level specification for the logger
    pub const fn log_level(&self) -> &'static str {
        if self.quiet {
            return "off";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Run the selected subcommand
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the subcommand
    pub fn run(self) -> Result<()> {
        let show_progress = self.should_show_progress();
        match self.command {
            Command::Segment(args) => {
                FileProcessor::new(args, show_progress)?.process()?;
            }
            Command::Patches(args) => {
                build_training_patches(&args)?;
            }
            Command::Coverage(args) => {
                evaluate_coverage(&args)?;
            }
        }
        Ok(())
    }
}

/// Available operations
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Predict a label map for every photograph
    Segment(SegmentArgs),
    /// Cut photographs and their masks into training patches
    Patches(PatchesArgs),
    /// Compute ground-truth coverage over a training patch tree
    Coverage(CoverageArgs),
}

/// Tiling and blending options
#[derive(Args, Debug, Clone, PartialEq)]
pub struct TilingArgs {
    /// Side length of square patches
    #[arg(short, long, default_value_t = DEFAULT_PATCH_SIZE)]
    pub patch_size: usize,

    /// Pixels shared by neighbouring patches
    #[arg(long, default_value_t = DEFAULT_PATCH_OVERLAP)]
    pub overlap: usize,

    /// Patches per model call
    #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// How overlapping predictions are combined
    #[arg(long, value_enum, default_value_t = BlendMode::Overwrite)]
    pub blend: BlendMode,

    /// Gaussian standard deviation for weighted blending
    #[arg(long, default_value_t = DEFAULT_KERNEL_SIGMA)]
    pub sigma: f64,

    /// Gaussian window size for weighted blending
    #[arg(long, default_value_t = DEFAULT_KERNEL_WINDOW)]
    pub window: usize,

    /// Gain applied to the normalised blending kernel
    #[arg(long, default_value_t = DEFAULT_KERNEL_GAIN)]
    pub gain: f64,
}

impl TilingArgs {
    /// Engine configuration for a model with `n_classes` outputs
    pub const fn to_config(&self, n_classes: usize) -> TilingConfig {
        TilingConfig {
            patch_size: self.patch_size,
            overlap: self.overlap,
            n_classes,
            batch_size: self.batch_size,
            blend_mode: self.blend,
            kernel_sigma: self.sigma,
            kernel_window: self.window,
            kernel_gain: self.gain,
        }
    }
}

/// Options of the `segment` subcommand
#[derive(Args, Debug, Clone, PartialEq)]
pub struct SegmentArgs {
    /// Input photograph or directory to process
    #[arg(value_name = "TARGET")]
    pub target: PathBuf,

    /// Tiling options
    #[command(flatten)]
    pub tiling: TilingArgs,

    /// Shrink photographs by this integer factor before segmenting
    #[arg(short, long, default_value_t = 1)]
    pub downscale: u32,

    /// Directory for label maps (defaults to next to each input)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also export one binary mask per class
    #[arg(short, long)]
    pub masks: bool,

    /// Process files even if output exists
    #[arg(short, long)]
    pub no_skip: bool,

    /// Worker threads (defaults to one per core)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

impl SegmentArgs {
    /// Check if existing output files should be skipped
    pub const fn skip_existing(&self) -> bool {
        !self.no_skip
    }

    /// Label map path for an input photograph
    pub fn output_path(&self, input_path: &Path) -> PathBuf {
        let stem = input_path.file_stem().unwrap_or_default();
        let output_name = format!("{}{OUTPUT_SUFFIX}.png", stem.to_string_lossy());
        match (&self.output, input_path.parent()) {
            (Some(dir), _) => dir.join(output_name),
            (None, Some(parent)) => parent.join(output_name),
            (None, None) => PathBuf::from(output_name),
        }
    }

    /// Directory receiving the per-class masks of an input photograph
    pub fn masks_dir(&self, input_path: &Path) -> PathBuf {
        let stem = input_path.file_stem().unwrap_or_default();
        let base = match (&self.output, input_path.parent()) {
            (Some(dir), _) => dir.clone(),
            (None, Some(parent)) => parent.to_path_buf(),
            (None, None) => PathBuf::new(),
        };
        base.join(stem)
    }
}

/// Options of the `patches` subcommand
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct PatchesArgs {
    /// Directory of source photographs
    #[arg(value_name = "IMAGES")]
    pub images: PathBuf,

    /// Directory holding `<image>/<class>/*.png` masks
    #[arg(value_name = "MASKS")]
    pub masks: PathBuf,

    /// Root of the patch tree to write
    #[arg(short, long)]
    pub output: PathBuf,

    /// Side length of square patches
    #[arg(short, long, default_value_t = DEFAULT_PATCH_SIZE)]
    pub patch_size: usize,
}

/// Options of the `coverage` subcommand
#[derive(Args, Debug, Clone, PartialEq)]
pub struct CoverageArgs {
    /// Root of the patch tree
    #[arg(value_name = "PATCHES")]
    pub patches: PathBuf,

    /// CSV cache of coverage values, reused and updated
    #[arg(short, long)]
    pub cache: PathBuf,

    /// Minimum non-background percentage kept for training
    #[arg(short, long, default_value_t = PATCH_COVERAGE_PERCENT_LIMIT)]
    pub limit: f64,
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
}

fn is_label_output(path: &Path) -> bool {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| stem.ends_with(OUTPUT_SUFFIX))
}

/// Photographs directly inside `dir`, sorted, excluding label map outputs
///
/// # Errors
///
/// Returns an error if the directory cannot be read
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_file_operation(dir, "read directory")? {
        let path = entry.with_file_operation(dir, "read directory")?.path();
        if path.is_file() && is_image_file(&path) && !is_label_output(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| path_error(path, "file name is not valid UTF-8"))
}

/// Orchestrates parallel segmentation of photographs with progress tracking
pub struct FileProcessor {
    args: SegmentArgs,
    palette: ClassPalette,
    config: TilingConfig,
    show_progress: bool,
}

impl FileProcessor {
    /// Create a processor for the given arguments
    ///
    /// # Errors
    ///
    /// Returns an error if the tiling options are invalid
    pub fn new(args: SegmentArgs, show_progress: bool) -> Result<Self> {
        let palette = ClassPalette::default();
        let config = args.tiling.to_config(palette.len());
        config.validate()?;
        if args.downscale == 0 {
            return Err(invalid_parameter(
                "downscale",
                &args.downscale,
                &"must be at least 1",
            ));
        }

        Ok(Self {
            args,
            palette,
            config,
            show_progress,
        })
    }

    /// Segment every selected photograph
    ///
    /// Returns the number of photographs segmented.
    ///
    /// # Errors
    ///
    /// Returns an error if target validation or any file fails
    pub fn process(&self) -> Result<usize> {
        let files = self.collect_files()?;
        if files.is_empty() {
            info!("Nothing to segment in {}", self.args.target.display());
            return Ok(0);
        }

        let progress = if self.show_progress {
            ProgressManager::new(files.len())
        } else {
            ProgressManager::hidden(files.len())
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.args.jobs.unwrap_or(0))
            .build()
            .map_err(|e| invalid_parameter("jobs", &self.args.jobs.unwrap_or(0), &e))?;

        let result = pool.install(|| {
            files
                .par_iter()
                .map(|file| self.process_file(file, &progress))
                .collect::<Result<Vec<()>>>()
        });
        progress.finish();
        result?;

        Ok(files.len())
    }

    fn collect_files(&self) -> Result<Vec<PathBuf>> {
        let target = &self.args.target;
        let candidates = if target.is_file() {
            if !is_image_file(target) {
                return Err(path_error(target, "target file must be a PNG or JPEG image"));
            }
            vec![target.clone()]
        } else if target.is_dir() {
            collect_images(target)?
        } else {
            return Err(path_error(
                target,
                "target must be an image file or directory",
            ));
        };

        Ok(candidates
            .into_iter()
            .filter(|path| self.should_process_file(path))
            .collect())
    }

    fn should_process_file(&self, input_path: &Path) -> bool {
        if !self.args.skip_existing() {
            return true;
        }

        if self.args.output_path(input_path).exists() {
            warn!("Skipping: {} (output exists)", input_path.display());
            false
        } else {
            true
        }
    }

    fn process_file(&self, input_path: &Path, progress: &ProgressManager) -> Result<()> {
        let start_time = Instant::now();
        let image = load_rgb_image(input_path)?;
        let image = downscale(image.view(), self.args.downscale)?;
        let (height, width, _) = image.dim();

        let model = NearestColorModel::new(&self.palette.colors());
        let mut segmenter = Segmenter::new(model, self.config.clone())?;
        let bar = progress.start_file(input_path, segmenter.total_batches(height, width)?);

        let labels = segmenter.segment_with_progress(image.view(), |done, _total| {
            bar.set_position(done as u64);
        })?;
        progress.complete_file(&bar);

        let output_path = self.args.output_path(input_path);
        export_label_map(&labels, &self.palette, &output_path)?;

        if self.args.masks {
            let stem = file_stem(input_path)?;
            export_class_masks(
                &labels,
                &self.palette,
                &self.args.masks_dir(input_path),
                &stem,
            )?;
        }

        info!(
            "Segmented {} ({height}x{width}) in {:.2?} -> {}",
            input_path.display(),
            start_time.elapsed(),
            output_path.display()
        );
        Ok(())
    }
}

/// Write the training patch tree for every photograph in a directory
///
/// Returns the number of image patches written.
///
/// # Errors
///
/// Returns an error if a photograph or mask cannot be read or a patch saved
pub fn build_training_patches(args: &PatchesArgs) -> Result<usize> {
    let palette = ClassPalette::default();
    let layout = PatchLayout::new(&args.output);

    let mut written = 0;
    for image_path in collect_images(&args.images)? {
        let stem = file_stem(&image_path)?;
        let image = load_rgb_image(&image_path)?;
        let count = layout.save_image_patches(&stem, image.view(), args.patch_size)?;

        for (class, mask) in load_source_masks(&args.masks, &stem, &palette)? {
            if mask.dim() != (image.dim().0, image.dim().1) {
                warn!("Skipping {class} mask of {stem}: size differs from the photograph");
                continue;
            }
            layout.save_label_patches(&stem, &class, mask.view(), args.patch_size)?;
        }

        info!("Wrote {count} patches for {stem}");
        written += count;
    }
    Ok(written)
}

/// Compute coverage of every stored patch, reusing and updating the cache
///
/// # Errors
///
/// Returns an error if the limit is invalid, the cache cannot be read or
/// written, or a patch cannot be read
pub fn evaluate_coverage(args: &CoverageArgs) -> Result<CoverageSummary> {
    let palette = ClassPalette::default();
    let filter = CoverageFilter::new(args.limit, BACKGROUND_CLASS_ID)?;
    let layout = PatchLayout::new(&args.patches);
    let mut cache = CoverageCache::load_or_default(&args.cache)?;

    let mut summary = CoverageSummary::default();
    for patch in layout.stored_patches()? {
        let key = layout.cache_key(&patch);
        let percent = cache.get_or_compute(&key, || {
            let classes = layout.class_map(&patch, &palette)?;
            Ok(coverage_percent(classes.view(), BACKGROUND_CLASS_ID))
        })?;
        summary.record(filter.verdict(percent));
    }

    cache.save(&args.cache)?;
    info!(
        "{} patches: {} kept, {} below {}% coverage, {} background only",
        summary.total(),
        summary.kept,
        summary.low_coverage,
        filter.limit_percent(),
        summary.background_only
    );
    Ok(summary)
}
