use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::pipeline::TrainingReport;

const PREVIEW_CHARS: usize = 50;

/// Label, confidence and full distribution for one analyzed text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predicted_label: String,
    pub confidence: f64,
    pub all_scores: BTreeMap<String, f64>,
    /// Wall-clock seconds spent on vectorizing and scoring
    pub analysis_duration: f64,
    pub requester_id: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub index: usize,
    pub text_preview: String,
    pub predicted_label: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub total_analyzed: usize,
    pub results: Vec<BatchItem>,
    pub timestamp: String,
}

/// How the active model was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingInfo {
    pub algorithm: String,
    pub vectorizer: String,
    pub ngram_range: (usize, usize),
    pub max_features: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescription {
    pub model_type: String,
    pub vectorizer_type: String,
    pub supported_labels: Vec<String>,
    /// Labels in probability-index order
    pub classifier_labels: Vec<String>,
    pub vocabulary_size: usize,
    pub max_features: usize,
    pub ngram_range: (usize, usize),
    pub run_id: String,
    pub trained_at: String,
    pub training_info: TrainingInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainResponse {
    pub status: String,
    pub message: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<TrainingReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub model_loaded: bool,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub message: String,
    pub version: String,
    pub model_loaded: bool,
    pub supported_labels: Vec<String>,
}

pub(crate) fn timestamp() -> String {
    Utc::now().to_rfc3339()
}

/// First 50 characters of `text`, with `...` appended when it was cut.
pub fn text_preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_preview() {
        assert_eq!(text_preview("short"), "short");

        let exact = "a".repeat(50);
        assert_eq!(text_preview(&exact), exact);

        let long = "b".repeat(51);
        assert_eq!(text_preview(&long), format!("{}...", "b".repeat(50)));

        // counts characters, not bytes
        let hangul = "가".repeat(60);
        assert_eq!(text_preview(&hangul), format!("{}...", "가".repeat(50)));
    }

    #[test]
    fn test_retrain_response_omits_empty_report() -> Result<(), serde_json::Error> {
        let response = RetrainResponse {
            status: "error".into(),
            message: "boom".into(),
            timestamp: timestamp(),
            report: None,
        };
        let json = serde_json::to_string(&response)?;
        assert!(!json.contains("report"));
        Ok(())
    }
}
