//! CLI entry point for patch-wise segmentation and training data curation

use clap::Parser;
use flexi_logger::Logger;
use patchstitch::TilingError;
use patchstitch::io::cli::Cli;

fn main() -> patchstitch::Result<()> {
    let cli = Cli::parse();
    let _logger = Logger::try_with_str(cli.log_level())
        .and_then(|logger| logger.log_to_stderr().start())
        .map_err(|e| TilingError::Logging {
            reason: e.to_string(),
        })?;
    cli.run()
}
