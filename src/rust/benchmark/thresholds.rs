use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Scores strictly above `min_score` map to `label`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBucket {
    pub min_score: f64,
    pub label: String,
}

impl ThresholdBucket {
    pub fn new(min_score: f64, label: impl Into<String>) -> Self {
        Self {
            min_score,
            label: label.into(),
        }
    }
}

/// Maps a scalar in `[0, 1]` onto a personality label.
///
/// Buckets are checked in order and the first one whose threshold the score
/// exceeds wins; scores below every bucket get `fallback`. The default table
/// is a placeholder policy carried over from the first sentiment experiments:
///
/// | score   | label  |
/// |---------|--------|
/// | > 0.7   | 적극형 |
/// | > 0.5   | 논리형 |
/// | else    | 신중형 |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdTable {
    pub name: String,
    pub buckets: Vec<ThresholdBucket>,
    pub fallback: String,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            name: "sentiment-placeholder".to_string(),
            buckets: vec![
                ThresholdBucket::new(0.7, "적극형"),
                ThresholdBucket::new(0.5, "논리형"),
            ],
            fallback: "신중형".to_string(),
        }
    }
}

impl ThresholdTable {
    /// Buckets must have non-empty labels and strictly decreasing
    /// thresholds inside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(format!("threshold table '{}': {}", self.name, msg)));

        if self.fallback.trim().is_empty() {
            return invalid("fallback label is empty".into());
        }
        let mut previous = f64::INFINITY;
        for bucket in &self.buckets {
            if bucket.label.trim().is_empty() {
                return invalid(format!("bucket at {} has an empty label", bucket.min_score));
            }
            if !(0.0..=1.0).contains(&bucket.min_score) {
                return invalid(format!("threshold {} is outside [0, 1]", bucket.min_score));
            }
            if bucket.min_score >= previous {
                return invalid("thresholds must be strictly decreasing".into());
            }
            previous = bucket.min_score;
        }
        Ok(())
    }

    pub fn map(&self, score: f64) -> &str {
        self.buckets
            .iter()
            .find(|bucket| score > bucket.min_score)
            .map(|bucket| bucket.label.as_str())
            .unwrap_or(&self.fallback)
    }

    /// Every label this table can emit, bucket order then fallback
    pub fn labels(&self) -> Vec<&str> {
        self.buckets
            .iter()
            .map(|bucket| bucket.label.as_str())
            .chain(std::iter::once(self.fallback.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mapping() {
        let table = ThresholdTable::default();
        assert!(table.validate().is_ok());
        assert_eq!(table.map(0.95), "적극형");
        assert_eq!(table.map(0.7), "논리형");
        assert_eq!(table.map(0.6), "논리형");
        assert_eq!(table.map(0.5), "신중형");
        assert_eq!(table.map(0.0), "신중형");
        assert_eq!(table.labels(), vec!["적극형", "논리형", "신중형"]);
    }

    #[test]
    fn test_invalid_tables() {
        let mut table = ThresholdTable::default();
        table.buckets.reverse();
        assert!(matches!(table.validate(), Err(PipelineError::InvalidConfig(_))));

        let mut table = ThresholdTable::default();
        table.fallback = String::new();
        assert!(table.validate().is_err());

        let mut table = ThresholdTable::default();
        table.buckets.push(ThresholdBucket::new(-0.1, "x"));
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_from_toml() -> std::result::Result<(), toml::de::Error> {
        let table: ThresholdTable = toml::from_str(
            r#"
            name = "two-way"
            fallback = "collector"
            buckets = [{ min_score = 0.5, label = "explorer" }]
            "#,
        )?;
        assert_eq!(table.map(0.8), "explorer");
        assert_eq!(table.map(0.2), "collector");
        Ok(())
    }
}
