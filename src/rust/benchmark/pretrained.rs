use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::lexicon::LexiconSentiment;
use super::remote::{RemoteEndpoint, RemoteSentiment, RemoteZeroShot};
use super::thresholds::ThresholdTable;
use crate::config::BenchmarkConfig;
use crate::embedding::{ClassifierError, EmbeddingMatcher, LabelDefinition};
use crate::model_manager::ModelManager;
use crate::models::BuiltinModel;

const HF_INFERENCE_URL: &str = "https://api-inference.huggingface.co/models";

fn default_builtin() -> BuiltinModel {
    BuiltinModel::MiniLM
}

/// A pretrained model entry as written in the `[[benchmark.models]]` config.
///
/// ```toml
/// [[benchmark.models]]
/// kind = "remote_zero_shot"
/// name = "facebook/bart-large-mnli"
/// endpoint = "https://api-inference.huggingface.co/models/facebook/bart-large-mnli"
///
/// [[benchmark.models]]
/// kind = "lexicon_sentiment"
/// name = "lexicon"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PretrainedModelSpec {
    RemoteZeroShot {
        name: String,
        endpoint: String,
    },
    RemoteSentiment {
        name: String,
        endpoint: String,
    },
    Embedding {
        name: String,
        #[serde(default = "default_builtin")]
        model: BuiltinModel,
    },
    LexiconSentiment {
        name: String,
    },
}

impl PretrainedModelSpec {
    /// A sentiment model and a zero-shot NLI model on the hosted inference API
    pub fn defaults() -> Vec<Self> {
        let hosted = |id: &str| format!("{}/{}", HF_INFERENCE_URL, id);
        vec![
            PretrainedModelSpec::RemoteSentiment {
                name: "cardiffnlp/twitter-roberta-base-sentiment-latest".into(),
                endpoint: hosted("cardiffnlp/twitter-roberta-base-sentiment-latest"),
            },
            PretrainedModelSpec::RemoteZeroShot {
                name: "facebook/bart-large-mnli".into(),
                endpoint: hosted("facebook/bart-large-mnli"),
            },
        ]
    }

    pub fn name(&self) -> &str {
        match self {
            PretrainedModelSpec::RemoteZeroShot { name, .. }
            | PretrainedModelSpec::RemoteSentiment { name, .. }
            | PretrainedModelSpec::Embedding { name, .. }
            | PretrainedModelSpec::LexiconSentiment { name } => name,
        }
    }
}

/// Backends that pick directly among candidate labels
#[derive(Debug, Clone)]
pub enum LabelMatcher {
    RemoteZeroShot(RemoteZeroShot),
    Embedding(EmbeddingMatcher),
}

/// Backends that produce one score in `[0, 1]` per text
#[derive(Debug, Clone)]
pub enum ScalarScorer {
    RemoteSentiment(RemoteSentiment),
    Lexicon(LexiconSentiment),
}

impl ScalarScorer {
    pub async fn score(&self, text: &str) -> Result<f64, ClassifierError> {
        match self {
            ScalarScorer::RemoteSentiment(remote) => remote.score(text).await,
            ScalarScorer::Lexicon(lexicon) => Ok(lexicon.score(text)),
        }
    }
}

/// A pretrained text classifier adapted to predict personality labels.
#[derive(Debug, Clone)]
pub enum PretrainedModel {
    /// The backend chooses among the dataset's labels
    LabelMatching {
        name: String,
        matcher: LabelMatcher,
        candidates: Vec<String>,
    },
    /// The backend's scalar is bucketed into a label by a threshold table
    ScalarRemapping {
        name: String,
        scorer: ScalarScorer,
        thresholds: ThresholdTable,
    },
}

impl PretrainedModel {
    /// Constructs the backend `spec` names. `candidates` are the labels a
    /// label-matching backend may answer with.
    pub async fn from_spec(
        spec: &PretrainedModelSpec,
        candidates: &[String],
        config: &BenchmarkConfig,
    ) -> Result<Self, ClassifierError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let name = spec.name().to_string();

        match spec {
            PretrainedModelSpec::RemoteZeroShot { endpoint, .. } => Ok(PretrainedModel::LabelMatching {
                name,
                matcher: LabelMatcher::RemoteZeroShot(RemoteZeroShot::new(RemoteEndpoint::new(
                    endpoint.as_str(),
                    timeout,
                )?)),
                candidates: candidates.to_vec(),
            }),
            PretrainedModelSpec::RemoteSentiment { endpoint, .. } => Ok(PretrainedModel::ScalarRemapping {
                name,
                scorer: ScalarScorer::RemoteSentiment(RemoteSentiment::new(RemoteEndpoint::new(
                    endpoint.as_str(),
                    timeout,
                )?)),
                thresholds: config.thresholds.clone(),
            }),
            PretrainedModelSpec::LexiconSentiment { .. } => Ok(PretrainedModel::ScalarRemapping {
                name,
                scorer: ScalarScorer::Lexicon(LexiconSentiment::default()),
                thresholds: config.thresholds.clone(),
            }),
            PretrainedModelSpec::Embedding { model, .. } => {
                let matcher = build_embedding_matcher(*model, candidates, config).await?;
                Ok(PretrainedModel::LabelMatching {
                    name,
                    matcher: LabelMatcher::Embedding(matcher),
                    candidates: candidates.to_vec(),
                })
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PretrainedModel::LabelMatching { name, .. } | PretrainedModel::ScalarRemapping { name, .. } => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PretrainedModel::LabelMatching { .. } => "label_matching",
            PretrainedModel::ScalarRemapping { .. } => "scalar_remapping",
        }
    }

    pub async fn classify(&self, text: &str) -> Result<String, ClassifierError> {
        match self {
            PretrainedModel::LabelMatching {
                matcher: LabelMatcher::RemoteZeroShot(remote),
                candidates,
                ..
            } => remote.classify(text, candidates).await,
            PretrainedModel::LabelMatching {
                matcher: LabelMatcher::Embedding(matcher),
                ..
            } => {
                let matcher = matcher.clone();
                let text = text.to_string();
                tokio::task::spawn_blocking(move || matcher.predict(&text).map(|(label, _)| label))
                    .await
                    .map_err(|e| ClassifierError::PredictionError(e.to_string()))?
            }
            PretrainedModel::ScalarRemapping { scorer, thresholds, .. } => {
                let score = scorer.score(text).await?;
                Ok(thresholds.map(score).to_string())
            }
        }
    }
}

async fn build_embedding_matcher(
    model: BuiltinModel,
    candidates: &[String],
    config: &BenchmarkConfig,
) -> Result<EmbeddingMatcher, ClassifierError> {
    let manager = ModelManager::new_default()
        .map_err(|e| ClassifierError::BuildError(format!("Failed to create model manager: {}", e)))?;
    manager.ensure_model_downloaded(model).await?;

    let definitions: Vec<LabelDefinition> = candidates
        .iter()
        .map(|label| {
            let definition = LabelDefinition::new(label.as_str());
            match config.label_descriptions.get(label) {
                Some(description) => definition.with_description(description.as_str()),
                None => definition,
            }
        })
        .collect();

    tokio::task::spawn_blocking(move || {
        definitions
            .into_iter()
            .try_fold(EmbeddingMatcher::builder().with_model(model, &manager)?, |builder, definition| {
                builder.add_label(definition)
            })?
            .build()
    })
    .await
    .map_err(|e| ClassifierError::BuildError(e.to_string()))?
}
