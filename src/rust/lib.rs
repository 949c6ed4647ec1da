//! Personality-type classification from free-text interview answers.
//!
//! The crate trains a TF-IDF + one-vs-rest logistic regression classifier
//! from labeled interview sessions, persists it as a versioned set of JSON
//! artifacts, serves predictions through [`InferenceService`], and benchmarks
//! the baseline against pretrained text classifiers.
//!
//! # Training and serving
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use persona::{InferenceService, Trainer};
//!
//! let mut trainer = Trainer::new("data/interview_dataset.json", "models");
//! let (artifacts, report) = trainer.run("models")?;
//! println!("test accuracy: {:.3}", report.test_accuracy);
//!
//! let service = InferenceService::with_artifacts(artifacts);
//! let response = service.predict_one("I like to plan everything in advance", Some("user-1"))?;
//! println!("{} ({:.2})", response.predicted_label, response.confidence);
//!
//! // later, once more labeled data has arrived
//! service.reload(Trainer::new("data/interview_dataset.json", "models")).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! [`InferenceService`] is `Send + Sync`; share it behind an `Arc`. Every
//! prediction runs against an immutable snapshot of the active model, so a
//! concurrent reload never changes a model mid-request.
//!
//! ```
//! use persona::InferenceService;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let service = Arc::new(InferenceService::new());
//! assert!(service.predict_one("anything", None).is_err());
//!
//! let handles: Vec<_> = (0..3)
//!     .map(|_| {
//!         let service = Arc::clone(&service);
//!         thread::spawn(move || service.health().model_loaded)
//!     })
//!     .collect();
//! for handle in handles {
//!     assert!(!handle.join().unwrap());
//! }
//! ```

pub mod benchmark;
pub mod config;
pub mod embedding;
pub mod error;
pub mod model_manager;
pub mod models;
pub mod pipeline;
mod runtime;
pub mod service;

pub use benchmark::{BenchmarkHarness, BenchmarkReport, PretrainedModel, PretrainedModelSpec, ThresholdTable};
pub use config::Config;
pub use embedding::{ClassifierError, EmbeddingMatcher, LabelDefinition};
pub use error::{PipelineError, Result};
pub use model_manager::{ModelError, ModelManager};
pub use models::{BuiltinModel, ModelCharacteristics, ModelInfo};
pub use pipeline::{
    load_artifacts, load_dataset, Dataset, LogisticRegression, PredictionResult, TfidfVectorizer, TrainedArtifacts,
    Trainer, TrainerState, TrainingReport,
};
pub use runtime::{create_session_builder, RuntimeConfig};
pub use service::InferenceService;

/// Initializes `env_logger`, defaulting to `info` when `RUST_LOG` is unset.
/// Safe to call more than once.
pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();
}
