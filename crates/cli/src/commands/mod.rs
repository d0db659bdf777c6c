//! Command handlers for the textmerge CLI.
//!
//! Each subcommand lives in its own module. Shared helpers for reading
//! inputs, writing outputs and turning configuration into engine options
//! live here.

pub mod apply;
pub mod diff;
pub mod merge;
pub mod patch;

// Re-export command types for convenience
pub use apply::ApplyCommand;
pub use diff::DiffCommand;
pub use merge::MergeCommand;
pub use patch::PatchCommand;

use clap::ValueEnum;
use std::path::Path;
use textmerge_core::{config::AppConfig, AppResult};
use textmerge_engine::{AlignOptions, Granularity, SegmentOptions};

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Read a UTF-8 input file.
pub fn read_input(path: &Path) -> AppResult<String> {
    tracing::debug!("Reading {:?}", path);
    Ok(std::fs::read_to_string(path)?)
}

/// Write `content` to `output`, or to stdout when no path is given.
pub fn write_output(output: Option<&Path>, content: &str) -> AppResult<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)?;
            tracing::info!("Wrote {} bytes to {:?}", content.len(), path);
        }
        None => println!("{}", content),
    }
    Ok(())
}

/// Segmentation options from config, with an optional granularity override.
pub fn segment_options(
    config: &AppConfig,
    granularity: Option<Granularity>,
) -> AppResult<SegmentOptions> {
    let granularity = match granularity {
        Some(granularity) => granularity,
        None => config.merge.granularity.parse()?,
    };
    Ok(SegmentOptions {
        granularity,
        ..Default::default()
    })
}

pub fn align_options(config: &AppConfig) -> AlignOptions {
    AlignOptions {
        match_threshold: config.merge.match_threshold,
        ..Default::default()
    }
}
