//! Diff command handler.
//!
//! Prints the edit script between two versions of a document.

use super::{align_options, read_input, segment_options, write_output, OutputFormat};
use clap::Args;
use std::path::PathBuf;
use textmerge_core::{config::AppConfig, AppResult};
use textmerge_engine::diff::{DiffResult, EditOp, EditScope};
use textmerge_engine::{diff, DiffGranularity, DiffOptions, Granularity};

/// Show the edits between two versions of a document
#[derive(Args, Debug)]
pub struct DiffCommand {
    /// Original document
    pub original: PathBuf,

    /// Modified document
    pub modified: PathBuf,

    /// Split changed units into word-level edits
    #[arg(long)]
    pub words: bool,

    /// Unit size (sentence, paragraph, section)
    #[arg(short, long)]
    pub granularity: Option<Granularity>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Write output to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl DiffCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing diff command");
        tracing::debug!("Diff command options: {:?}", self);

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

        let result = diff(&original, &modified, &options, None).await?;

        let rendered = match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "edits": result.edits,
                "stats": result.stats,
            }))?,
            OutputFormat::Text => render_text(&result),
        };

        write_output(self.output.as_deref(), &rendered)
    }
}

fn render_text(result: &DiffResult) -> String {
    let mut lines = Vec::new();

    for edit in &result.edits {
        let old = edit.old_content.as_deref().unwrap_or_default();
        let new = edit.new_content.as_deref().unwrap_or_default();
        let marker = if edit.scope == EditScope::Word { "w" } else { " " };
        match edit.operation {
            EditOp::Keep => lines.push(format!("  {}", old)),
            EditOp::Delete => lines.push(format!("-{}{}", marker, old)),
            EditOp::Insert => lines.push(format!("+{}{}", marker, new)),
            EditOp::Replace => {
                lines.push(format!("-{}{}", marker, old));
                lines.push(format!("+{}{}", marker, new));
            }
            EditOp::Move => {}
        }
    }

    let stats = &result.stats;
    lines.push(String::new());
    lines.push(format!(
        "{} kept, {} inserted, {} deleted, {} replaced",
        stats.kept, stats.inserted, stats.deleted, stats.replaced
    ));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use textmerge_engine::diff::DiffStats;
    use textmerge_engine::{Edit, SemanticUnit};

    #[test]
    fn test_render_text() {
        let unit = SemanticUnit::new("Old sentence.", 0);
        let result = DiffResult {
            edits: vec![
                Edit::keep(&unit),
                Edit::replace(&unit, "New sentence.", 0.8, Default::default()),
            ],
            stats: DiffStats {
                kept: 1,
                replaced: 1,
                ..Default::default()
            },
        };

        let text = render_text(&result);
        assert!(text.contains("  Old sentence."));
        assert!(text.contains("- Old sentence.\n+ New sentence."));
        assert!(text.ends_with("1 kept, 0 inserted, 0 deleted, 1 replaced"));
    }
}
