use ndarray::Array1;
use ort::session::Session;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;

use super::embedding::TextEmbedding;
use super::error::ClassifierError;
use super::utils::{average_vectors, cosine_similarity, normalize_vector};
use crate::model_manager::ModelManager;
use crate::models::{BuiltinModel, ModelCharacteristics};
use crate::runtime::{create_session_builder, RuntimeConfig};

const MAX_LABELS: usize = 100;
const MAX_DESCRIPTION_LENGTH: usize = 1000;

/// A candidate label and the texts its prototype is averaged from.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelDefinition {
    pub label: String,
    /// Natural-language gloss of the label; embeds better than a bare name
    pub description: Option<String>,
    pub examples: Vec<String>,
}

impl LabelDefinition {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: None,
            examples: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_examples(mut self, examples: Vec<impl Into<String>>) -> Self {
        self.examples = examples.into_iter().map(Into::into).collect();
        self
    }

    /// The label itself, then the description, then every example.
    fn prototype_texts(&self) -> Vec<&str> {
        std::iter::once(self.label.as_str())
            .chain(self.description.as_deref())
            .chain(self.examples.iter().map(String::as_str))
            .collect()
    }

    fn validate(&self) -> Result<(), ClassifierError> {
        if self.label.trim().is_empty() {
            return Err(ClassifierError::ValidationError("Label cannot be empty".into()));
        }
        if let Some(description) = &self.description {
            if description.len() > MAX_DESCRIPTION_LENGTH {
                return Err(ClassifierError::ValidationError(format!(
                    "Description for '{}' is too long ({} chars, max is {})",
                    self.label,
                    description.len(),
                    MAX_DESCRIPTION_LENGTH
                )));
            }
        }
        if let Some(pos) = self.examples.iter().position(|e| e.is_empty()) {
            return Err(ClassifierError::ValidationError(format!(
                "Example {} of '{}' cannot be empty",
                pos + 1,
                self.label
            )));
        }
        Ok(())
    }
}

/// Builds an [`EmbeddingMatcher`] from an encoder and a set of labels.
#[derive(Default, Debug)]
pub struct EmbeddingMatcherBuilder {
    tokenizer: Option<Tokenizer>,
    session: Option<Session>,
    labels: Vec<LabelDefinition>,
    characteristics: Option<ModelCharacteristics>,
    runtime_config: RuntimeConfig,
}

impl TextEmbedding for EmbeddingMatcherBuilder {
    fn tokenizer(&self) -> Option<&Tokenizer> {
        self.tokenizer.as_ref()
    }

    fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn max_sequence_length(&self) -> Option<usize> {
        self.characteristics.as_ref().map(|c| c.max_sequence_length)
    }
}

impl EmbeddingMatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Must be called before the model is loaded to take effect
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Loads a built-in encoder that `manager` has already downloaded.
    pub fn with_model(mut self, model: BuiltinModel, manager: &ModelManager) -> Result<Self, ClassifierError> {
        if self.session.is_some() {
            return Err(ClassifierError::BuildError("Model already set".into()));
        }
        if !manager.is_model_downloaded(model) {
            return Err(ClassifierError::BuildError(format!(
                "Model '{:?}' is not downloaded. Run `persona download-model` first",
                model
            )));
        }

        let (tokenizer, session) = self.load(&manager.get_model_path(model), &manager.get_tokenizer_path(model))?;
        self.tokenizer = Some(tokenizer);
        self.session = Some(session);
        self.characteristics = Some(model.characteristics());
        Ok(self)
    }

    /// Loads an arbitrary encoder; the embedding size is inferred from a probe run.
    pub fn with_custom_model<P: AsRef<Path>, Q: AsRef<Path>>(
        mut self,
        model_path: P,
        tokenizer_path: Q,
        max_sequence_length: Option<usize>,
    ) -> Result<Self, ClassifierError> {
        if self.session.is_some() {
            return Err(ClassifierError::BuildError("Model already set".into()));
        }
        let (model_path, tokenizer_path) = (model_path.as_ref(), tokenizer_path.as_ref());
        if !model_path.exists() {
            return Err(ClassifierError::BuildError(format!("Model file not found: {:?}", model_path)));
        }
        if !tokenizer_path.exists() {
            return Err(ClassifierError::BuildError(format!(
                "Tokenizer file not found: {:?}",
                tokenizer_path
            )));
        }

        let (tokenizer, session) = self.load(model_path, tokenizer_path)?;
        self.tokenizer = Some(tokenizer);
        self.session = Some(session);
        self.characteristics = Some(ModelCharacteristics {
            embedding_size: 0,
            max_sequence_length: max_sequence_length.unwrap_or(256),
            model_size_mb: 0,
        });

        let embedding_size = self.embed_text("Probe input to infer embedding size")?.len();
        log::info!("Inferred embedding size from model: {}", embedding_size);
        if let Some(characteristics) = self.characteristics.as_mut() {
            characteristics.embedding_size = embedding_size;
        }
        Ok(self)
    }

    fn load(&self, model_path: &Path, tokenizer_path: &Path) -> Result<(Tokenizer, Session), ClassifierError> {
        let tokenizer = Tokenizer::from_file(tokenizer_path).map_err(|e| {
            log::error!("Failed to load tokenizer: {}", e);
            ClassifierError::BuildError(format!("Failed to load tokenizer: {}", e))
        })?;

        let session = create_session_builder(&self.runtime_config)?.commit_from_file(model_path)?;
        Self::validate_model(&session)?;
        log::info!("Loaded encoder from {:?}", model_path);
        Ok((tokenizer, session))
    }

    pub fn add_label(mut self, label: LabelDefinition) -> Result<Self, ClassifierError> {
        label.validate()?;
        if self.labels.len() >= MAX_LABELS {
            return Err(ClassifierError::ValidationError(format!(
                "Maximum number of labels ({}) exceeded",
                MAX_LABELS
            )));
        }
        if self.labels.iter().any(|l| l.label == label.label) {
            return Err(ClassifierError::ValidationError(format!(
                "Label '{}' added twice",
                label.label
            )));
        }
        self.labels.push(label);
        Ok(self)
    }

    pub fn build(mut self) -> Result<EmbeddingMatcher, ClassifierError> {
        if self.labels.is_empty() {
            return Err(ClassifierError::BuildError("At least one label must be added".into()));
        }
        let characteristics = self
            .characteristics
            .clone()
            .ok_or_else(|| ClassifierError::BuildError("No model loaded".into()))?;

        let mut prototypes = BTreeMap::new();
        for definition in &self.labels {
            let embedded: Vec<Array1<f32>> = definition
                .prototype_texts()
                .into_iter()
                .filter_map(|text| match self.embed_text(text) {
                    Ok(embedding) => Some(embedding),
                    Err(e) => {
                        log::error!("Failed to embed '{}' for label '{}': {}", text, definition.label, e);
                        None
                    }
                })
                .collect();

            if embedded.is_empty() {
                return Err(ClassifierError::BuildError(format!(
                    "No valid embeddings generated for label '{}'",
                    definition.label
                )));
            }
            let prototype = normalize_vector(&average_vectors(&embedded, characteristics.embedding_size));
            prototypes.insert(definition.label.clone(), prototype);
        }

        let tokenizer = self
            .tokenizer
            .take()
            .ok_or_else(|| ClassifierError::BuildError("No tokenizer loaded".into()))?;
        let session = self
            .session
            .take()
            .ok_or_else(|| ClassifierError::BuildError("No ONNX model loaded".into()))?;

        Ok(EmbeddingMatcher {
            tokenizer: Arc::new(tokenizer),
            session: Arc::new(session),
            prototypes: Arc::new(prototypes.into_iter().collect()),
            characteristics,
        })
    }

    fn validate_model(session: &Session) -> Result<(), ClassifierError> {
        if session.inputs.len() < 2 {
            return Err(ClassifierError::ModelError(format!(
                "Model must have at least 2 inputs (input_ids and attention_mask), found {}",
                session.inputs.len()
            )));
        }
        if session.outputs.is_empty() {
            return Err(ClassifierError::ModelError(
                "Model must have at least 1 output for embeddings".into(),
            ));
        }
        Ok(())
    }
}

/// Picks the label whose prototype embedding is closest to the input.
///
/// Cheap to clone; clones share the encoder session.
#[derive(Debug, Clone)]
pub struct EmbeddingMatcher {
    tokenizer: Arc<Tokenizer>,
    session: Arc<Session>,
    /// Sorted by label
    prototypes: Arc<Vec<(String, Array1<f32>)>>,
    characteristics: ModelCharacteristics,
}

const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<EmbeddingMatcher>();
    }
};

impl TextEmbedding for EmbeddingMatcher {
    fn tokenizer(&self) -> Option<&Tokenizer> {
        Some(&self.tokenizer)
    }

    fn session(&self) -> Option<&Session> {
        Some(&self.session)
    }

    fn max_sequence_length(&self) -> Option<usize> {
        Some(self.characteristics.max_sequence_length)
    }
}

impl EmbeddingMatcher {
    pub fn builder() -> EmbeddingMatcherBuilder {
        EmbeddingMatcherBuilder::new()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.prototypes.iter().map(|(label, _)| label.as_str()).collect()
    }

    pub fn characteristics(&self) -> &ModelCharacteristics {
        &self.characteristics
    }

    pub fn token_count(&self, text: &str) -> Result<usize, ClassifierError> {
        self.count_tokens(text)
    }

    /// Best label and the cosine similarity to every prototype.
    ///
    /// When two prototypes are equally close the label that sorts first wins.
    pub fn predict(&self, text: &str) -> Result<(String, BTreeMap<String, f32>), ClassifierError> {
        if text.trim().is_empty() {
            return Err(ClassifierError::ValidationError("Input text cannot be empty".into()));
        }
        let input = self.embed_text(text)?;

        let mut best: Option<(&str, f32)> = None;
        let mut scores = BTreeMap::new();
        for (label, prototype) in self.prototypes.iter() {
            let similarity = cosine_similarity(&input, prototype);
            if best.map_or(true, |(_, s)| similarity > s) {
                best = Some((label.as_str(), similarity));
            }
            scores.insert(label.clone(), similarity);
        }

        let (label, _) = best.ok_or_else(|| ClassifierError::PredictionError("No labels to match".into()))?;
        Ok((label.to_string(), scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prototype_texts() {
        let definition = LabelDefinition::new("explorer")
            .with_description("Enjoys discovering hidden places")
            .with_examples(vec!["secret maps"]);
        assert_eq!(
            definition.prototype_texts(),
            vec!["explorer", "Enjoys discovering hidden places", "secret maps"]
        );
        assert_eq!(LabelDefinition::new("x").prototype_texts(), vec!["x"]);
    }

    #[test]
    fn test_label_validation() {
        assert!(EmbeddingMatcherBuilder::new().add_label(LabelDefinition::new(" ")).is_err());
        assert!(EmbeddingMatcherBuilder::new()
            .add_label(LabelDefinition::new("x").with_examples(vec![""]))
            .is_err());
        assert!(EmbeddingMatcherBuilder::new()
            .add_label(LabelDefinition::new("x").with_description("d".repeat(1001)))
            .is_err());

        let duplicate = EmbeddingMatcherBuilder::new()
            .add_label(LabelDefinition::new("x"))
            .and_then(|b| b.add_label(LabelDefinition::new("x")));
        assert!(matches!(duplicate, Err(ClassifierError::ValidationError(_))));
    }

    #[test]
    fn test_build_requires_model_and_labels() {
        assert!(matches!(
            EmbeddingMatcherBuilder::new().build(),
            Err(ClassifierError::BuildError(_))
        ));

        let no_model = EmbeddingMatcherBuilder::new()
            .add_label(LabelDefinition::new("x"))
            .and_then(|b| b.build());
        assert!(matches!(no_model, Err(ClassifierError::BuildError(_))));
    }

    #[test]
    fn test_missing_custom_model() {
        let result = EmbeddingMatcherBuilder::new().with_custom_model(
            "/definitely/not/here/model.onnx",
            "/definitely/not/here/tokenizer.json",
            None,
        );
        assert!(matches!(result, Err(ClassifierError::BuildError(_))));
    }
}
