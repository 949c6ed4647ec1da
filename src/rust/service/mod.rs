//! Stateful inference over one active model version.

mod responses;

pub use responses::{
    text_preview, BatchItem, BatchResponse, HealthStatus, ModelDescription, PredictionResponse,
    RetrainResponse, ServiceStatus, TrainingInfo,
};

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use tokio::sync::Mutex;

use crate::error::{PipelineError, Result};
use crate::pipeline::{load_artifacts, TrainedArtifacts, Trainer};
use responses::timestamp;

const DEFAULT_REQUESTER: &str = "anonymous";

/// Serves predictions from the active [`TrainedArtifacts`] and swaps in new
/// versions on reload.
///
/// Readers clone the active `Arc` under a short read lock and work on that
/// snapshot, so a reload never changes the model under an in-flight call.
/// Reloads are serialized; a reload requested while another is running is
/// rejected with [`PipelineError::RetrainInProgress`].
///
/// ```no_run
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// use persona::{Config, InferenceService, Trainer};
///
/// let config = Config::resolve(None)?;
/// let service = InferenceService::new();
/// service.load_or_train(Trainer::from_config(&config)).await?;
///
/// let response = service.predict_one("I love finding hidden areas", None)?;
/// println!("{} ({:.2})", response.predicted_label, response.confidence);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InferenceService {
    active: RwLock<Option<Arc<TrainedArtifacts>>>,
    reload_lock: Arc<Mutex<()>>,
}

// Shared across request handlers
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<InferenceService>();
    }
};

impl InferenceService {
    /// Creates a service with no active model
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artifacts(artifacts: TrainedArtifacts) -> Self {
        let service = Self::new();
        service.activate(artifacts);
        service
    }

    pub fn is_ready(&self) -> bool {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The active model version, or `ModelNotReady`.
    pub fn snapshot(&self) -> Result<Arc<TrainedArtifacts>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(PipelineError::ModelNotReady)
    }

    /// Makes `artifacts` the active model version.
    pub fn activate(&self, artifacts: TrainedArtifacts) {
        let run_id = artifacts.run_id().to_string();
        let previous = self
            .active
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Arc::new(artifacts));
        match previous {
            Some(old) => log::info!("Activated model {} (replacing {})", run_id, old.run_id()),
            None => log::info!("Activated model {}", run_id),
        }
    }

    /// Activates the model persisted in `dir`. On error the current model,
    /// if any, stays active.
    pub fn load_from_dir<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let artifacts = load_artifacts(dir)?;
        self.activate(artifacts);
        Ok(())
    }

    /// Startup path: use the persisted model when there is one, otherwise
    /// train and persist a new one.
    pub async fn load_or_train(&self, trainer: Trainer) -> Result<()> {
        match self.load_from_dir(trainer.model_dir()) {
            Ok(()) => Ok(()),
            Err(PipelineError::ArtifactsNotFound(reason)) => {
                log::info!("No saved model ({}), training a new one", reason);
                self.reload(trainer).await.map(|_| ())
            }
            Err(e) => Err(e),
        }
    }

    pub fn predict_one(&self, text: &str, requester_id: Option<&str>) -> Result<PredictionResponse> {
        let artifacts = self.snapshot()?;
        let started = Instant::now();
        let prediction = artifacts.predict(text)?;

        Ok(PredictionResponse {
            predicted_label: prediction.predicted_label,
            confidence: prediction.confidence,
            all_scores: prediction.all_scores,
            analysis_duration: started.elapsed().as_secs_f64(),
            requester_id: requester_id.unwrap_or(DEFAULT_REQUESTER).to_string(),
            timestamp: timestamp(),
        })
    }

    /// Predicts every text against one snapshot, preserving input order.
    pub fn predict_batch<S: AsRef<str>>(&self, texts: &[S]) -> Result<BatchResponse> {
        let artifacts = self.snapshot()?;
        let results = texts
            .iter()
            .enumerate()
            .map(|(index, text)| {
                let text = text.as_ref();
                let prediction = artifacts.predict(text)?;
                Ok(BatchItem {
                    index,
                    text_preview: text_preview(text),
                    predicted_label: prediction.predicted_label,
                    confidence: prediction.confidence,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(BatchResponse {
            total_analyzed: results.len(),
            results,
            timestamp: timestamp(),
        })
    }

    pub fn describe_model(&self) -> Result<ModelDescription> {
        let artifacts = self.snapshot()?;
        let vectorizer = artifacts.vectorizer();
        let labels = artifacts.labels().as_slice().to_vec();

        Ok(ModelDescription {
            model_type: "LogisticRegression".into(),
            vectorizer_type: "TfidfVectorizer".into(),
            supported_labels: labels,
            classifier_labels: artifacts.classifier().classes().to_vec(),
            vocabulary_size: vectorizer.vocabulary_size(),
            max_features: vectorizer.max_features(),
            ngram_range: vectorizer.ngram_range(),
            run_id: artifacts.run_id().to_string(),
            trained_at: artifacts.created_at().to_rfc3339(),
            training_info: TrainingInfo {
                algorithm: "one-vs-rest logistic regression".into(),
                vectorizer: "TF-IDF".into(),
                ngram_range: vectorizer.ngram_range(),
                max_features: vectorizer.max_features(),
            },
        })
    }

    /// Runs `trainer` to completion on a blocking worker, then swaps the new
    /// model in. A failed run leaves the current model active.
    pub async fn reload(&self, mut trainer: Trainer) -> Result<RetrainResponse> {
        let guard = Arc::clone(&self.reload_lock)
            .try_lock_owned()
            .map_err(|_| PipelineError::RetrainInProgress)?;

        // Released only after the blocking run, save included, has finished
        log::info!("Retraining model into {:?}", trainer.model_dir());
        let (_guard, outcome) = tokio::task::spawn_blocking(move || (guard, trainer.run_default()))
            .await
            .map_err(|e| PipelineError::TrainingAborted(e.to_string()))?;

        let (artifacts, report) = outcome.map_err(|e| {
            log::error!("Retrain failed, keeping the current model: {}", e);
            e
        })?;

        self.activate(artifacts);
        Ok(RetrainResponse {
            status: "success".into(),
            message: format!(
                "Model {} retrained with test accuracy {:.3}",
                report.run_id, report.test_accuracy
            ),
            timestamp: timestamp(),
            report: Some(report),
        })
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy".into(),
            model_loaded: self.is_ready(),
            timestamp: timestamp(),
        }
    }

    pub fn status(&self) -> ServiceStatus {
        let supported_labels = self
            .snapshot()
            .map(|a| a.labels().as_slice().to_vec())
            .unwrap_or_default();
        ServiceStatus {
            message: "Personality classification service is running".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            model_loaded: !supported_labels.is_empty(),
            supported_labels,
        }
    }
}
