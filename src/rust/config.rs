//! Strongly-typed configuration loaded from TOML.
//!
//! Every section falls back to its defaults, so a config file only needs the
//! keys it wants to change:
//!
//! ```toml
//! [data]
//! dataset_path = "data/interview_dataset.json"
//! test_ratio = 0.2
//! seed = 42
//!
//! [vectorizer]
//! max_features = 1000
//! ngram_range = [1, 2]
//!
//! [classifier]
//! c = 1.0
//! max_iter = 1000
//!
//! [output]
//! model_dir = "models"
//!
//! [benchmark]
//! sample_size = 10
//! timeout_secs = 30
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::benchmark::{PretrainedModelSpec, ThresholdTable};
use crate::error::{PipelineError, Result};

const CONFIG_ENV: &str = "PERSONA_CONFIG";
const MODEL_DIR_ENV: &str = "PERSONA_MODEL_DIR";
const DEFAULT_CONFIG_FILE: &str = "persona.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub vectorizer: VectorizerConfig,
    pub classifier: ClassifierConfig,
    pub output: OutputConfig,
    pub benchmark: BenchmarkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// JSON file holding the labeled interview sessions
    pub dataset_path: PathBuf,
    /// Fraction of sessions held out for evaluation
    pub test_ratio: f64,
    /// Seed for the train/test shuffle; fixed so runs are comparable
    pub seed: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("data/interview_dataset.json"),
            test_ratio: 0.2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizerConfig {
    pub max_features: usize,
    /// Inclusive n-gram bounds, `[1, 2]` means unigrams and bigrams
    pub ngram_range: (usize, usize),
    /// L2-normalize each transformed vector
    pub normalize: bool,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            max_features: 1000,
            ngram_range: (1, 2),
            normalize: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Inverse regularization strength
    pub c: f64,
    pub max_iter: usize,
    pub tolerance: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub model_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Held-out documents sent to each pretrained model
    pub sample_size: usize,
    /// Per-item budget for a pretrained model call
    pub timeout_secs: u64,
    pub models: Vec<PretrainedModelSpec>,
    /// Score buckets used by sentiment-style models
    pub thresholds: ThresholdTable,
    /// Optional natural-language description per label, used by the
    /// embedding matcher to build richer label prototypes
    pub label_descriptions: HashMap<String, String>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            sample_size: 10,
            timeout_secs: 30,
            models: PretrainedModelSpec::defaults(),
            thresholds: ThresholdTable::default(),
            label_descriptions: HashMap::new(),
        }
    }
}

impl Config {
    /// Loads and validates a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Picks the configuration source in priority order: the explicit path,
    /// `PERSONA_CONFIG`, a `persona.toml` in the working directory, defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            log::info!("Loading configuration from {:?}", path);
            return Self::load(path);
        }
        if let Ok(path) = env::var(CONFIG_ENV) {
            log::info!("Loading configuration from ${} = {}", CONFIG_ENV, path);
            return Self::load(path);
        }
        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            log::info!("Loading configuration from {}", DEFAULT_CONFIG_FILE);
            return Self::load(DEFAULT_CONFIG_FILE);
        }
        log::info!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));

        if !(self.data.test_ratio > 0.0 && self.data.test_ratio < 1.0) {
            return invalid(format!(
                "data.test_ratio must be in (0, 1), got {}",
                self.data.test_ratio
            ));
        }
        if self.vectorizer.max_features == 0 {
            return invalid("vectorizer.max_features must be positive".into());
        }
        let (min_n, max_n) = self.vectorizer.ngram_range;
        if min_n == 0 || min_n > max_n {
            return invalid(format!(
                "vectorizer.ngram_range must satisfy 1 <= min <= max, got [{}, {}]",
                min_n, max_n
            ));
        }
        if self.classifier.c <= 0.0 || !self.classifier.c.is_finite() {
            return invalid(format!("classifier.c must be positive, got {}", self.classifier.c));
        }
        if self.classifier.max_iter == 0 {
            return invalid("classifier.max_iter must be positive".into());
        }
        if self.benchmark.timeout_secs == 0 {
            return invalid("benchmark.timeout_secs must be positive".into());
        }
        self.benchmark.thresholds.validate()?;
        Ok(())
    }
}

/// Returns the default directory for persisted artifacts
pub fn default_model_dir() -> PathBuf {
    if let Ok(path) = env::var(MODEL_DIR_ENV) {
        return PathBuf::from(path);
    }

    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("persona").join("models");
    }

    if let Some(home_dir) = dirs::home_dir() {
        return home_dir.join(".local").join("share").join("persona").join("models");
    }

    env::temp_dir().join("persona").join("models")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.vectorizer.max_features, 1000);
        assert_eq!(config.vectorizer.ngram_range, (1, 2));
        assert_eq!(config.data.seed, 42);
        assert_eq!(config.benchmark.sample_size, 10);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let config = Config::from_toml(
            r#"
            [vectorizer]
            max_features = 200

            [data]
            seed = 7
            "#,
        )?;
        assert_eq!(config.vectorizer.max_features, 200);
        assert_eq!(config.vectorizer.ngram_range, (1, 2));
        assert_eq!(config.data.seed, 7);
        assert!((config.data.test_ratio - 0.2).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_ratio = Config::from_toml("[data]\ntest_ratio = 1.5\n");
        assert!(matches!(bad_ratio, Err(PipelineError::InvalidConfig(_))));

        let bad_ngram = Config::from_toml("[vectorizer]\nngram_range = [2, 1]\n");
        assert!(matches!(bad_ngram, Err(PipelineError::InvalidConfig(_))));

        let not_toml = Config::from_toml("this is = = not toml");
        assert!(matches!(not_toml, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_default_model_dir() {
        env::set_var(MODEL_DIR_ENV, "/tmp/persona-test-models");
        let path = default_model_dir();
        assert_eq!(path, PathBuf::from("/tmp/persona-test-models"));
        env::remove_var(MODEL_DIR_ENV);

        let path = default_model_dir();
        assert!(path.to_string_lossy().contains("persona"));
    }
}
