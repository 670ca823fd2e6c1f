//! Configuration for the vitals pipeline.

use crate::core::features::FeatureProfile;
use crate::core::severity::ScoringRules;
use crate::core::windowing::{LabelAlignment, Windower, DEFAULT_WINDOW_SIZE};
use crate::error::Result as PipelineResult;
use crate::ingest::ImputationStrategy;
use crate::orchestrator::RiskThresholds;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main configuration for the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory of source tables, or a single CSV file
    pub input_path: PathBuf,

    /// Path for exported tables, features, windows and reports
    pub export_path: PathBuf,

    /// Path for storing run statistics
    pub data_path: PathBuf,

    /// Records per sequence window
    pub window_size: usize,

    /// Which record labels a training window
    pub label_alignment: LabelAlignment,

    /// Feature manifest used for extraction
    pub feature_profile: FeatureProfile,

    /// Ingestion-time fill of missing numeric values
    pub imputation: ImputationStrategy,

    /// Threshold table for the rule-based scorer
    pub scoring: ScoringRules,

    /// Forecast escalation bounds, resolved at call time. Empty unless the
    /// file provides them.
    #[serde(default)]
    pub risk_thresholds: BTreeMap<String, f64>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("icu-vitals");

        Self {
            input_path: PathBuf::from("data"),
            export_path: data_dir.join("exports"),
            data_path: data_dir,
            window_size: DEFAULT_WINDOW_SIZE,
            label_alignment: LabelAlignment::default(),
            feature_profile: FeatureProfile::default(),
            imputation: ImputationStrategy::default(),
            scoring: ScoringRules::default(),
            risk_thresholds: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a file, falling back to defaults when it does
    /// not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("icu-vitals")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)?;
        std::fs::create_dir_all(&self.data_path)?;
        Ok(())
    }

    pub fn run_stats_path(&self) -> PathBuf {
        self.data_path.join(crate::audit::RUN_STATS_FILE)
    }

    pub fn windower(&self) -> PipelineResult<Windower> {
        Windower::new(self.window_size, self.label_alignment)
    }

    /// Fill absent escalation bounds with the reference values, keeping any
    /// already set. Used when writing a fresh config file.
    pub fn fill_reference_thresholds(&mut self) {
        for (key, value) in RiskThresholds::reference_map() {
            self.risk_thresholds.entry(key).or_insert(value);
        }
    }

    /// Resolve the escalation thresholds; a missing key is an error.
    pub fn thresholds(&self) -> PipelineResult<RiskThresholds> {
        RiskThresholds::from_map(&self.risk_thresholds)
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
}
