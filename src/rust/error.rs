use std::io;

/// Errors raised by the training and serving pipeline.
///
/// Loader, vectorizer, classifier and trainer failures are never recovered
/// internally; they travel up to the trainer orchestration or to the
/// [`InferenceService`](crate::InferenceService) as one of these variants.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),
    #[error("Dataset malformed: {0}")]
    DatasetMalformed(String),
    #[error("Vectorizer has not been fitted")]
    VectorizerNotFitted,
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
    #[error("Feature dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Artifacts not found: {0}")]
    ArtifactsNotFound(String),
    #[error("Artifacts corrupted: {0}")]
    ArtifactsCorrupted(String),
    #[error("Failed to persist {path}: {source}")]
    PersistenceError {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Model unavailable: no trained model is active")]
    ModelNotReady,
    #[error("A retrain is already in progress")]
    RetrainInProgress,
    #[error("Training task aborted: {0}")]
    TrainingAborted(String),
    #[error("Invalid trainer state: expected {expected}, found {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    pub(crate) fn persistence(path: impl AsRef<std::path::Path>, source: io::Error) -> Self {
        PipelineError::PersistenceError {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Whether the caller can reasonably retry or fix input and try again.
    ///
    /// Corrupted artifacts and write failures are fatal for the current
    /// model version; everything about missing models or bad datasets is not.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            PipelineError::ArtifactsCorrupted(_) | PipelineError::PersistenceError { .. }
        )
    }

    /// Distinguishes "no model loaded yet" from genuine failures, so front
    /// ends can show a model-unavailable message instead of a generic error.
    pub fn is_model_unavailable(&self) -> bool {
        matches!(self, PipelineError::ModelNotReady)
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability() {
        assert!(PipelineError::ModelNotReady.is_recoverable());
        assert!(PipelineError::DatasetMalformed("x".into()).is_recoverable());
        assert!(PipelineError::RetrainInProgress.is_recoverable());
        assert!(!PipelineError::ArtifactsCorrupted("x".into()).is_recoverable());
        assert!(!PipelineError::persistence("/tmp/x", io::Error::other("disk full")).is_recoverable());
    }

    #[test]
    fn test_model_unavailable_message() {
        let err = PipelineError::ModelNotReady;
        assert!(err.is_model_unavailable());
        assert!(err.to_string().contains("Model unavailable"));
        assert!(!PipelineError::VectorizerNotFitted.is_model_unavailable());
    }
}
