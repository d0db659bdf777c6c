//! Configuration management for textmerge.
//!
//! Configuration is layered, later sources winning:
//! - Built-in defaults
//! - Config file (`.textmerge/config.yaml` in the workspace, or `TEXTMERGE_CONFIG`)
//! - Environment variables
//! - Command-line flags (`with_overrides`)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::logging::LogFormat;

/// Embedding providers the engine knows how to build.
pub const KNOWN_PROVIDERS: [&str; 3] = ["trigram", "char-frequency", "ollama"];

/// Conflict strategies accepted by the merge engine.
pub const KNOWN_STRATEGIES: [&str; 5] = ["prefer-a", "prefer-b", "prefer-c", "concatenate", "defer"];

/// Segmentation granularities accepted by the merge engine.
pub const KNOWN_GRANULARITIES: [&str; 3] = ["sentence", "paragraph", "section"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .textmerge/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Log output format
    pub log_format: LogFormat,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Use the character-frequency provider instead of the configured model
    pub no_ml: bool,

    /// Embedding provider settings
    pub embedding: EmbeddingSettings,

    /// Merge defaults
    pub merge: MergeSettings,
}

/// Embedding provider settings from config.yaml.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingSettings {
    /// Provider name: "trigram", "char-frequency", "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Maximum number of memoized embeddings
    pub cache_capacity: usize,

    /// Service endpoint for remote providers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 256,
            cache_capacity: 1000,
            endpoint: None,
        }
    }
}

/// Merge defaults from config.yaml.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSettings {
    /// Conflict strategy name (e.g., "defer", "prefer-b")
    pub strategy: String,

    /// Minimum similarity for two units to be paired
    pub match_threshold: f32,

    /// Segmentation granularity
    pub granularity: String,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            strategy: "defer".to_string(),
            match_threshold: 0.75,
            granularity: "sentence".to_string(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    embedding: Option<EmbeddingSection>,
    merge: Option<MergeSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmbeddingSection {
    provider: Option<String>,
    model: Option<String>,
    dimensions: Option<usize>,
    cache_capacity: Option<usize>,
    endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MergeSection {
    strategy: Option<String>,
    match_threshold: Option<f32>,
    granularity: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
    format: Option<LogFormat>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            log_format: LogFormat::Text,
            verbose: false,
            no_color: false,
            no_ml: false,
            embedding: EmbeddingSettings::default(),
            merge: MergeSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `TEXTMERGE_WORKSPACE`: Override workspace path
    /// - `TEXTMERGE_CONFIG`: Path to config file
    /// - `TEXTMERGE_PROVIDER`: Embedding provider
    /// - `TEXTMERGE_STRATEGY`: Default conflict strategy
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use textmerge_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Strategy: {}", config.merge.strategy);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_with(None, None)
    }

    /// Load configuration, with explicit workspace and config file taking
    /// precedence over their environment variables.
    pub fn load_with(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace
            .or_else(|| std::env::var("TEXTMERGE_WORKSPACE").ok().map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        config.config_file = config_file
            .or_else(|| std::env::var("TEXTMERGE_CONFIG").ok().map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.textmerge_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file does not exist: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("TEXTMERGE_PROVIDER") {
            config.embedding.provider = provider;
        }

        if let Ok(strategy) = std::env::var("TEXTMERGE_STRATEGY") {
            config.merge.strategy = strategy;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(mut self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        if let Some(embedding) = file.embedding {
            if let Some(provider) = embedding.provider {
                self.embedding.provider = provider;
            }
            if let Some(model) = embedding.model {
                self.embedding.model = model;
            }
            if let Some(dimensions) = embedding.dimensions {
                self.embedding.dimensions = dimensions;
            }
            if let Some(capacity) = embedding.cache_capacity {
                self.embedding.cache_capacity = capacity;
            }
            if embedding.endpoint.is_some() {
                self.embedding.endpoint = embedding.endpoint;
            }
        }

        if let Some(merge) = file.merge {
            if let Some(strategy) = merge.strategy {
                self.merge.strategy = strategy;
            }
            if let Some(threshold) = merge.match_threshold {
                self.merge.match_threshold = threshold;
            }
            if let Some(granularity) = merge.granularity {
                self.merge.granularity = granularity;
            }
        }

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                self.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                self.no_color = !color;
            }
            if let Some(format) = logging.format {
                self.log_format = format;
            }
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(self)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over the config file and
    /// environment variables.
    pub fn with_overrides(
        mut self,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        no_ml: bool,
        strategy: Option<String>,
    ) -> Self {
        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if no_ml {
            self.no_ml = true;
            self.embedding.provider = "char-frequency".to_string();
            self.embedding.model = "char-frequency-v1".to_string();
            self.embedding.dimensions = 26;
        }

        if let Some(strategy) = strategy {
            self.merge.strategy = strategy;
        }

        self
    }

    /// Get the path to the .textmerge directory.
    pub fn textmerge_dir(&self) -> PathBuf {
        self.workspace.join(".textmerge")
    }

    /// Validate provider, strategy, granularity and threshold settings.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_PROVIDERS.contains(&self.embedding.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embedding.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be positive".to_string(),
            ));
        }

        if !KNOWN_STRATEGIES.contains(&self.merge.strategy.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown conflict strategy: {}. Supported: {}",
                self.merge.strategy,
                KNOWN_STRATEGIES.join(", ")
            )));
        }

        if !KNOWN_GRANULARITIES.contains(&self.merge.granularity.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown granularity: {}. Supported: {}",
                self.merge.granularity,
                KNOWN_GRANULARITIES.join(", ")
            )));
        }

        let threshold = self.merge.match_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(AppError::Config(format!(
                "Match threshold must be in (0, 1], got {}",
                threshold
            )));
        }

        Ok(())
    }
}
