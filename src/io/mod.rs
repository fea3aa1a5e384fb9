//! Input/output, configuration and the ambient plumbing around the engine
//!
//! This module contains:
//! - Error types and configuration defaults
//! - Image loading, palette rendering and patch tree storage
//! - The command-line interface and progress display

/// Command-line parsing and batch orchestration
pub mod cli;
/// Engine defaults, blend modes and configuration validation
pub mod configuration;
/// Error types and context helpers
pub mod error;
/// Image loading, conversion and label map export
pub mod image;
/// Class names and display colours
pub mod palette;
/// Multi-file progress display
pub mod progress;
/// Training patch tree layout
pub mod storage;
