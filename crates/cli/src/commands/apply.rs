//! Apply command handler.
//!
//! Applies a JSON patch to a document, adapting edits whose anchors moved.

use super::{read_input, segment_options, write_output, OutputFormat};
use clap::Args;
use std::path::PathBuf;
use textmerge_core::{config::AppConfig, AppResult};
use textmerge_engine::{apply_patch, deserialize_patch, is_compatible, ApplyOptions, ApplyResult};

/// Apply a patch to a document
#[derive(Args, Debug)]
pub struct ApplyCommand {
    /// Patch file created by `textmerge patch`
    pub patch: PathBuf,

    /// Document to patch
    pub target: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Write output to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl ApplyCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing apply command");

        let patch = deserialize_patch(&read_input(&self.patch)?)?;
        let text = read_input(&self.target)?;

        if !is_compatible(&patch, &text) {
            tracing::info!("Base hash differs from target, edits will be matched by context");
        }

        let options = ApplyOptions {
            segment: segment_options(config, None)?,
        };
        let result = apply_patch(&patch, &text, &options);

        for failed in &result.failed {
            eprintln!(
                "warning: {:?} edit on {} not applied: {}",
                failed.edit.operation,
                display_anchor(&failed.edit.anchor),
                failed.reason
            );
        }

        let rendered = match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&report(&result))?,
            OutputFormat::Text => result.text.clone(),
        };

        write_output(self.output.as_deref(), &rendered)
    }
}

fn display_anchor(anchor: &str) -> &str {
    if anchor.is_empty() {
        "<start>"
    } else {
        anchor
    }
}

fn report(result: &ApplyResult) -> serde_json::Value {
    serde_json::json!({
        "text": result.text,
        "applied": result.applied,
        "adapted": result
            .adapted
            .iter()
            .map(|a| serde_json::json!({ "edit": a.edit, "confidence": a.confidence }))
            .collect::<Vec<_>>(),
        "failed": result
            .failed
            .iter()
            .map(|f| serde_json::json!({ "edit": f.edit, "reason": f.reason }))
            .collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_shape() {
        let result = ApplyResult {
            text: "Patched.".to_string(),
            ..Default::default()
        };
        let value = report(&result);
        assert_eq!(value["text"], "Patched.");
        assert!(value["applied"].as_array().unwrap().is_empty());
        assert!(value["failed"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_display_anchor() {
        assert_eq!(display_anchor(""), "<start>");
        assert_eq!(display_anchor("811c9dc5"), "811c9dc5");
    }
}
