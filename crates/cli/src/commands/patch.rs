//! Patch command handler.
//!
//! Writes a JSON patch that turns one version of a document into another.

use super::{align_options, read_input, segment_options, write_output};
use clap::Args;
use std::path::PathBuf;
use textmerge_core::{config::AppConfig, AppResult};
use textmerge_engine::{create_patch, serialize_patch, DiffGranularity, DiffOptions, Granularity};

/// Create a patch from two versions of a document
#[derive(Args, Debug)]
pub struct PatchCommand {
    /// Original document
    pub original: PathBuf,

    /// Modified document
    pub modified: PathBuf,

    /// Record word-level edits inside changed units
    #[arg(long)]
    pub words: bool,

    /// Unit size (sentence, paragraph, section)
    #[arg(short, long)]
    pub granularity: Option<Granularity>,

    /// Free-form JSON stored in the patch metadata
    #[arg(long)]
    pub metadata: Option<String>,

    /// Write the patch to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl PatchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing patch command");

        let original = read_input(&self.original)?;
        let modified = read_input(&self.modified)?;

        let options = DiffOptions {
            segment: segment_options(config, self.granularity)?,
            align: align_options(config),
            granularity: if self.words {
                DiffGranularity::Word
            } else {
                DiffGranularity::Unit
            },
        };

        let mut patch = create_patch(&original, &modified, &options, None).await?;
        if let Some(ref metadata) = self.metadata {
            patch.metadata = Some(serde_json::from_str(metadata)?);
        }

        tracing::info!("Patch has {} edits", patch.edits.len());
        write_output(self.output.as_deref(), &serialize_patch(&patch)?)
    }
}
