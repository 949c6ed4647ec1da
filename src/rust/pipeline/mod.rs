//! Offline training pipeline: dataset loading, TF-IDF vectorization,
//! one-vs-rest logistic regression and artifact persistence.

pub mod artifacts;
pub mod dataset;
pub mod logistic;
pub mod trainer;
pub mod vectorizer;

pub use artifacts::{load_artifacts, LabelSet, PredictionResult, TrainedArtifacts, ARTIFACT_FILES};
pub use dataset::{load_dataset, load_sessions, parse_sessions, Dataset, InterviewSession, QaPair};
pub use logistic::LogisticRegression;
pub use trainer::{train_test_split, Trainer, TrainerState, TrainingReport};
pub use vectorizer::{FeatureVector, TfidfVectorizer};
