//! Fitted model versions and their on-disk form.
//!
//! A model version is three JSON files in one directory. Each file wraps its
//! payload in an envelope carrying the training run id, so a directory whose
//! files come from different runs is detected and refused at load time.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use super::logistic::{argmax, LogisticRegression};
use super::vectorizer::TfidfVectorizer;
use crate::error::{PipelineError, Result};

pub const VECTORIZER_FILE: &str = "vectorizer.json";
pub const CLASSIFIER_FILE: &str = "classifier.json";
pub const LABELS_FILE: &str = "labels.json";
pub const ARTIFACT_FILES: [&str; 3] = [VECTORIZER_FILE, CLASSIFIER_FILE, LABELS_FILE];

/// Personality labels in the classifier's probability-index order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(Vec<String>);

impl LabelSet {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.iter().any(|l| l == label)
    }
}

/// Inference output for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predicted_label: String,
    /// Probability of `predicted_label`, the largest entry of `all_scores`
    pub confidence: f64,
    pub all_scores: BTreeMap<String, f64>,
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    run_id: String,
    created_at: DateTime<Utc>,
    payload: T,
}

/// A deployable model version: fitted vectorizer, fitted classifier and the
/// label order that ties their outputs together.
#[derive(Debug, Clone)]
pub struct TrainedArtifacts {
    run_id: String,
    created_at: DateTime<Utc>,
    vectorizer: TfidfVectorizer,
    classifier: LogisticRegression,
    labels: LabelSet,
}

impl TrainedArtifacts {
    pub(crate) fn new(vectorizer: TfidfVectorizer, classifier: LogisticRegression) -> Self {
        let created_at = Utc::now();
        let labels = LabelSet(classifier.classes().to_vec());

        let mut hasher = Sha256::new();
        hasher.update(created_at.to_rfc3339().as_bytes());
        hasher.update(rand::random::<u64>().to_le_bytes());
        for label in labels.as_slice() {
            hasher.update(label.as_bytes());
        }
        let run_id = format!("{:x}", hasher.finalize())[..16].to_string();

        Self {
            run_id,
            created_at,
            vectorizer,
            classifier,
            labels,
        }
    }

    /// Identifier shared by the three files of this model version
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn vectorizer(&self) -> &TfidfVectorizer {
        &self.vectorizer
    }

    pub fn classifier(&self) -> &LogisticRegression {
        &self.classifier
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Transforms `text` with the fitted vocabulary and scores every label.
    pub fn predict(&self, text: &str) -> Result<PredictionResult> {
        let features = self.vectorizer.transform_one(text)?;
        let proba = self.classifier.predict_proba_one(&features)?;
        let best = argmax(&proba);

        let all_scores = self
            .labels
            .as_slice()
            .iter()
            .cloned()
            .zip(proba.iter().copied())
            .collect();

        Ok(PredictionResult {
            predicted_label: self.labels.as_slice()[best].clone(),
            confidence: proba[best],
            all_scores,
        })
    }

    /// Writes the three artifact files into `destination`.
    ///
    /// Files are first written and synced inside a staging directory under
    /// `destination`, then renamed into place. On failure the staging
    /// directory is dropped and no file under the final names is touched
    /// before all three exist.
    pub fn save<P: AsRef<Path>>(&self, destination: P) -> Result<()> {
        let destination = destination.as_ref();
        fs::create_dir_all(destination).map_err(|e| PipelineError::persistence(destination, e))?;

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(destination)
            .map_err(|e| PipelineError::persistence(destination, e))?;

        self.write_envelope(&staging.path().join(VECTORIZER_FILE), &self.vectorizer)?;
        self.write_envelope(&staging.path().join(CLASSIFIER_FILE), &self.classifier)?;
        self.write_envelope(&staging.path().join(LABELS_FILE), &self.labels)?;

        for name in ARTIFACT_FILES {
            let target = destination.join(name);
            fs::rename(staging.path().join(name), &target)
                .map_err(|e| PipelineError::persistence(&target, e))?;
        }

        log::info!(
            "Saved model {} ({} labels, {} features) to {:?}",
            self.run_id,
            self.labels.len(),
            self.vectorizer.vocabulary_size(),
            destination
        );
        Ok(())
    }

    fn write_envelope<T: Serialize>(&self, path: &Path, payload: &T) -> Result<()> {
        let envelope = Envelope {
            run_id: self.run_id.clone(),
            created_at: self.created_at,
            payload,
        };
        let bytes = serde_json::to_vec_pretty(&envelope)
            .map_err(|e| PipelineError::persistence(path, io::Error::other(e)))?;

        let mut file = File::create(path).map_err(|e| PipelineError::persistence(path, e))?;
        file.write_all(&bytes)
            .and_then(|_| file.sync_all())
            .map_err(|e| PipelineError::persistence(path, e))
    }
}

fn read_envelope<T: DeserializeOwned>(path: &Path) -> Result<Envelope<T>> {
    let json = fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => PipelineError::ArtifactsNotFound(path.display().to_string()),
        _ => PipelineError::persistence(path, e),
    })?;
    serde_json::from_str(&json)
        .map_err(|e| PipelineError::ArtifactsCorrupted(format!("{}: {}", path.display(), e)))
}

/// Loads a model version saved by [`TrainedArtifacts::save`].
///
/// Either all three files load and agree with each other, or an error is
/// returned and nothing is handed back.
pub fn load_artifacts<P: AsRef<Path>>(source: P) -> Result<TrainedArtifacts> {
    let source = source.as_ref();

    let missing: Vec<&str> = ARTIFACT_FILES
        .iter()
        .copied()
        .filter(|name| !source.join(name).is_file())
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::ArtifactsNotFound(format!(
            "{} missing from {}",
            missing.join(", "),
            source.display()
        )));
    }

    let vectorizer: Envelope<TfidfVectorizer> = read_envelope(&source.join(VECTORIZER_FILE))?;
    let classifier: Envelope<LogisticRegression> = read_envelope(&source.join(CLASSIFIER_FILE))?;
    let labels: Envelope<LabelSet> = read_envelope(&source.join(LABELS_FILE))?;

    if vectorizer.run_id != classifier.run_id || classifier.run_id != labels.run_id {
        return Err(PipelineError::ArtifactsCorrupted(format!(
            "artifacts come from different training runs (vectorizer {}, classifier {}, labels {})",
            vectorizer.run_id, classifier.run_id, labels.run_id
        )));
    }
    if !vectorizer.payload.is_fitted() || !classifier.payload.is_fitted() {
        return Err(PipelineError::ArtifactsCorrupted(
            "persisted vectorizer or classifier is not fitted".into(),
        ));
    }
    if labels.payload.as_slice() != classifier.payload.classes() {
        return Err(PipelineError::ArtifactsCorrupted(
            "label file does not match the classifier's label order".into(),
        ));
    }
    if vectorizer.payload.vocabulary_size() != classifier.payload.n_features() {
        return Err(PipelineError::ArtifactsCorrupted(format!(
            "vectorizer produces {} features but classifier expects {}",
            vectorizer.payload.vocabulary_size(),
            classifier.payload.n_features()
        )));
    }

    log::info!("Loaded model {} from {:?}", classifier.run_id, source);
    Ok(TrainedArtifacts {
        run_id: classifier.run_id,
        created_at: classifier.created_at,
        vectorizer: vectorizer.payload,
        classifier: classifier.payload,
        labels: labels.payload,
    })
}
