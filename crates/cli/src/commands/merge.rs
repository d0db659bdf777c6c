//! Merge command handler.
//!
//! Three-way merge of an original document with an upgraded and a
//! customized version of it.

use super::{align_options, read_input, segment_options, write_output, OutputFormat};
use clap::Args;
use std::path::PathBuf;
use textmerge_core::{config::AppConfig, AppResult};
use textmerge_engine::{merge, ConflictStrategy, Granularity, MergeOptions};

/// Merge an upgrade into a customized copy of a document
#[derive(Args, Debug)]
pub struct MergeCommand {
    /// Original document (A)
    pub original: PathBuf,

    /// Upgraded version of the original (B)
    pub upgraded: PathBuf,

    /// Customized version of the original (C)
    pub customized: PathBuf,

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

impl MergeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing merge command");
        tracing::debug!("Merge command options: {:?}", self);

        let original = read_input(&self.original)?;
        let upgraded = read_input(&self.upgraded)?;
        let customized = read_input(&self.customized)?;

        let strategy: ConflictStrategy = config.merge.strategy.parse()?;
        let options = MergeOptions {
            segment: segment_options(config, self.granularity)?,
            align: align_options(config),
            conflict_strategy: strategy,
        };

        let result = merge(&original, &upgraded, &customized, &options, None).await?;

        let stats = &result.stats;
        tracing::info!(
            "Merge finished: {} unchanged, {} upgraded, {} preserved, {} removed, {} auto-resolved, {} conflicts",
            stats.unchanged,
            stats.upgraded,
            stats.preserved,
            stats.removed,
            stats.auto_resolved,
            stats.conflicts
        );

        if result.has_conflicts() {
            eprintln!(
                "warning: {} unresolved conflict(s) left in the output (strategy: {})",
                result.conflicts.len(),
                strategy
            );
            for conflict in &result.conflicts {
                eprintln!("  {} at unit {}", conflict.id, conflict.unit_index);
            }
        }

        let rendered = match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&result)?,
            OutputFormat::Text => result.merged.clone(),
        };

        write_output(self.output.as_deref(), &rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        merge: MergeCommand,
    }

    #[tokio::test]
    async fn test_merge_files_to_output() {
        let temp = TempDir::new().unwrap();
        let write = |name: &str, text: &str| {
            let path = temp.path().join(name);
            std::fs::write(&path, text).unwrap();
            path
        };
        let a = write("a.md", "Alpha goes first. Gamma ends it.");
        let b = write("b.md", "Alpha goes first. Gamma ends it. Delta joins late.");
        let c = write("c.md", "Our team starts here. Alpha goes first. Gamma ends it.");
        let out = temp.path().join("merged.md");

        let harness = Harness::parse_from([
            "merge",
            a.to_str().unwrap(),
            b.to_str().unwrap(),
            c.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ]);
        harness.merge.execute(&AppConfig::default()).await.unwrap();

        let merged = std::fs::read_to_string(&out).unwrap();
        assert_eq!(
            merged,
            "Our team starts here. Alpha goes first. Gamma ends it. Delta joins late."
        );
    }
}
