//! Dataset → vectorizer → classifier orchestration.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::artifacts::TrainedArtifacts;
use super::dataset::{load_dataset, Dataset};
use super::logistic::LogisticRegression;
use super::vectorizer::TfidfVectorizer;
use crate::config::{ClassifierConfig, Config, VectorizerConfig};
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    Uninitialized,
    DataLoaded,
    Fitted,
    Persisted,
}

impl TrainerState {
    pub fn name(&self) -> &'static str {
        match self {
            TrainerState::Uninitialized => "Uninitialized",
            TrainerState::DataLoaded => "DataLoaded",
            TrainerState::Fitted => "Fitted",
            TrainerState::Persisted => "Persisted",
        }
    }
}

/// Outcome of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub run_id: String,
    pub train_size: usize,
    pub test_size: usize,
    pub train_accuracy: f64,
    pub test_accuracy: f64,
    pub vocabulary_size: usize,
    pub label_distribution: BTreeMap<String, usize>,
    pub duration_secs: f64,
}

/// Splits `dataset` into `(train, test)` after a seeded shuffle.
///
/// The test split holds `ceil(n * test_ratio)` rows, clamped so both splits
/// keep at least one row. The same seed always yields the same split.
pub fn train_test_split(dataset: &Dataset, test_ratio: f64, seed: u64) -> Result<(Dataset, Dataset)> {
    let n = dataset.len();
    if n < 2 {
        return Err(PipelineError::InsufficientData(format!(
            "need at least 2 documents to split, found {}",
            n
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_size = ((n as f64 * test_ratio).ceil() as usize).clamp(1, n - 1);
    let (test, train) = indices.split_at(test_size);
    Ok((dataset.subset(train), dataset.subset(test)))
}

/// Drives one training pipeline through
/// `Uninitialized → DataLoaded → Fitted → Persisted`.
#[derive(Debug)]
pub struct Trainer {
    dataset_path: PathBuf,
    model_dir: PathBuf,
    test_ratio: f64,
    seed: u64,
    vectorizer_config: VectorizerConfig,
    classifier_config: ClassifierConfig,
    state: TrainerState,
    dataset: Option<Dataset>,
    artifacts: Option<TrainedArtifacts>,
    report: Option<TrainingReport>,
}

impl Trainer {
    pub fn from_config(config: &Config) -> Self {
        Self {
            dataset_path: config.data.dataset_path.clone(),
            model_dir: config.output.model_dir.clone(),
            test_ratio: config.data.test_ratio,
            seed: config.data.seed,
            vectorizer_config: config.vectorizer.clone(),
            classifier_config: config.classifier.clone(),
            state: TrainerState::Uninitialized,
            dataset: None,
            artifacts: None,
            report: None,
        }
    }

    /// Trainer with default hyperparameters for the given input and output paths.
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(dataset_path: P, model_dir: Q) -> Self {
        let mut config = Config::default();
        config.data.dataset_path = dataset_path.into();
        config.output.model_dir = model_dir.into();
        Self::from_config(&config)
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn artifacts(&self) -> Option<&TrainedArtifacts> {
        self.artifacts.as_ref()
    }

    pub fn report(&self) -> Option<&TrainingReport> {
        self.report.as_ref()
    }

    fn invalid_state(&self, expected: &'static str) -> PipelineError {
        PipelineError::InvalidState {
            expected,
            actual: self.state.name(),
        }
    }

    /// Reads the dataset. A successful load discards any earlier fit.
    pub fn load(&mut self) -> Result<&Dataset> {
        let dataset = load_dataset(&self.dataset_path)?;
        self.artifacts = None;
        self.report = None;
        self.state = TrainerState::DataLoaded;
        Ok(&*self.dataset.insert(dataset))
    }

    /// Splits, fits and evaluates.
    ///
    /// From `Fitted` or `Persisted` this retrains into brand-new artifacts;
    /// files already on disk are left untouched until the next `save`.
    pub fn train(&mut self) -> Result<&TrainingReport> {
        let dataset = match (self.state, self.dataset.as_ref()) {
            (TrainerState::Uninitialized, _) | (_, None) => {
                return Err(self.invalid_state("DataLoaded"));
            }
            (_, Some(dataset)) => dataset,
        };

        let started = Instant::now();
        let (train, test) = train_test_split(dataset, self.test_ratio, self.seed)?;

        let mut vectorizer = TfidfVectorizer::from_config(&self.vectorizer_config);
        let x_train = vectorizer.fit_transform(train.documents())?;

        let mut classifier = LogisticRegression::from_config(&self.classifier_config);
        classifier.fit(&x_train, train.labels())?;

        let train_accuracy = classifier.score(&x_train, train.labels())?;
        let x_test = vectorizer.transform(test.documents())?;
        let test_accuracy = classifier.score(&x_test, test.labels())?;

        let artifacts = TrainedArtifacts::new(vectorizer, classifier);
        let report = TrainingReport {
            run_id: artifacts.run_id().to_string(),
            train_size: train.len(),
            test_size: test.len(),
            train_accuracy,
            test_accuracy,
            vocabulary_size: artifacts.vectorizer().vocabulary_size(),
            label_distribution: dataset.label_distribution(),
            duration_secs: started.elapsed().as_secs_f64(),
        };

        log::info!(
            "Trained model {}: train accuracy {:.3}, test accuracy {:.3} ({} train / {} test, {} features)",
            report.run_id,
            report.train_accuracy,
            report.test_accuracy,
            report.train_size,
            report.test_size,
            report.vocabulary_size
        );

        self.artifacts = Some(artifacts);
        self.state = TrainerState::Fitted;
        Ok(&*self.report.insert(report))
    }

    /// Persists the fitted artifacts under `destination`.
    pub fn save<P: AsRef<Path>>(&mut self, destination: P) -> Result<()> {
        let artifacts = match (self.state, self.artifacts.as_ref()) {
            (TrainerState::Fitted, Some(artifacts)) => artifacts,
            _ => return Err(self.invalid_state("Fitted")),
        };
        artifacts.save(destination)?;
        self.state = TrainerState::Persisted;
        Ok(())
    }

    /// Load, train and save into `destination`.
    pub fn run<P: AsRef<Path>>(&mut self, destination: P) -> Result<(TrainedArtifacts, TrainingReport)> {
        self.load()?;
        let report = self.train()?.clone();
        self.save(destination)?;
        let artifacts = self
            .artifacts
            .clone()
            .ok_or_else(|| self.invalid_state("Persisted"))?;
        Ok((artifacts, report))
    }

    /// [`run`](Self::run) into the configured model directory.
    pub fn run_default(&mut self) -> Result<(TrainedArtifacts, TrainingReport)> {
        let destination = self.model_dir.clone();
        self.run(destination)
    }
}
