use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use super::pretrained::PretrainedModel;
use crate::config::Config;
use crate::embedding::ClassifierError;
use crate::error::Result;
use crate::pipeline::{load_dataset, train_test_split, Dataset, LogisticRegression, TfidfVectorizer};

const BASELINE_NAME: &str = "tfidf-logistic-regression";
const EXAMPLES_PER_MODEL: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryStatus {
    Completed,
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamplePrediction {
    pub expected: String,
    pub predicted: String,
}

/// Accuracy and timing of one model on the benchmark sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkEntry {
    pub name: String,
    pub kind: String,
    #[serde(flatten)]
    pub status: EntryStatus,
    pub accuracy: f64,
    pub sample_size: usize,
    pub total_secs: f64,
    pub mean_secs: f64,
    pub examples: Vec<ExamplePrediction>,
}

impl BenchmarkEntry {
    fn skipped(name: &str, kind: &str, reason: String) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            status: EntryStatus::Skipped { reason },
            accuracy: 0.0,
            sample_size: 0,
            total_secs: 0.0,
            mean_secs: 0.0,
            examples: Vec::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == EntryStatus::Completed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    /// Ranked by accuracy, highest first; ties by name
    pub entries: Vec<BenchmarkEntry>,
    /// Name of the most accurate completed entry
    pub best: Option<String>,
    pub label_distribution: BTreeMap<String, usize>,
    pub timestamp: String,
}

impl BenchmarkReport {
    fn new(mut entries: Vec<BenchmarkEntry>, label_distribution: BTreeMap<String, usize>) -> Self {
        entries.sort_by(|a, b| {
            b.accuracy
                .total_cmp(&a.accuracy)
                .then_with(|| a.name.cmp(&b.name))
        });
        let best = entries
            .iter()
            .find(|e| e.is_completed())
            .map(|e| e.name.clone());
        Self {
            entries,
            best,
            label_distribution,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn entry(&self, name: &str) -> Option<&BenchmarkEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Label distribution:")?;
        for (label, count) in &self.label_distribution {
            writeln!(f, "  {}: {}", label, count)?;
        }
        writeln!(f)?;
        writeln!(f, "Ranking:")?;
        for (rank, entry) in self.entries.iter().enumerate() {
            match &entry.status {
                EntryStatus::Completed => writeln!(
                    f,
                    "  {}. {:<48} {:>6.1}%  ({} samples, {:.3}s total, {:.3}s/item)",
                    rank + 1,
                    entry.name,
                    entry.accuracy * 100.0,
                    entry.sample_size,
                    entry.total_secs,
                    entry.mean_secs
                )?,
                EntryStatus::Skipped { reason } => {
                    writeln!(f, "  {}. {:<48} skipped: {}", rank + 1, entry.name, reason)?
                }
            }
            for example in &entry.examples {
                writeln!(f, "       expected {} -> predicted {}", example.expected, example.predicted)?;
            }
        }
        if let Some(best) = &self.best {
            writeln!(f)?;
            writeln!(f, "Best model: {}", best)?;
        }
        Ok(())
    }
}

/// Compares the TF-IDF baseline with pretrained classifiers on the same
/// held-out split.
///
/// Only dataset problems and baseline training failures abort a run. Any
/// failure of a pretrained model is logged and recorded as a skipped entry.
/// The harness trains its own baseline and never touches a serving model.
#[derive(Debug, Clone)]
pub struct BenchmarkHarness {
    config: Config,
}

impl BenchmarkHarness {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Loads the configured dataset and benchmarks every configured model.
    pub async fn run(&self) -> Result<BenchmarkReport> {
        let dataset = load_dataset(&self.config.data.dataset_path)?;
        self.run_on(&dataset).await
    }

    pub async fn run_on(&self, dataset: &Dataset) -> Result<BenchmarkReport> {
        let candidates: Vec<String> = dataset.label_distribution().into_keys().collect();

        let mut models = Vec::new();
        let mut failed = Vec::new();
        for spec in &self.config.benchmark.models {
            match PretrainedModel::from_spec(spec, &candidates, &self.config.benchmark).await {
                Ok(model) => models.push(model),
                Err(e) => {
                    log::warn!("Skipping {}: could not construct model: {}", spec.name(), e);
                    failed.push(BenchmarkEntry::skipped(spec.name(), "unavailable", e.to_string()));
                }
            }
        }

        let mut report = self.run_with_models(dataset, &models).await?;
        if !failed.is_empty() {
            failed.extend(report.entries);
            report = BenchmarkReport::new(failed, report.label_distribution);
        }
        Ok(report)
    }

    /// Benchmarks the baseline plus already-constructed `models`.
    pub async fn run_with_models(&self, dataset: &Dataset, models: &[PretrainedModel]) -> Result<BenchmarkReport> {
        let (train, test) = train_test_split(dataset, self.config.data.test_ratio, self.config.data.seed)?;
        let mut entries = vec![self.run_baseline(&train, &test)?];

        let sample: Vec<(&str, &str)> = test
            .documents()
            .iter()
            .zip(test.labels())
            .take(self.config.benchmark.sample_size)
            .map(|(d, l)| (d.as_str(), l.as_str()))
            .collect();
        log::info!(
            "Benchmarking {} pretrained models on {} held-out documents",
            models.len(),
            sample.len()
        );

        for model in models {
            entries.push(self.run_model(model, &sample).await);
        }
        Ok(BenchmarkReport::new(entries, dataset.label_distribution()))
    }

    /// Fits the TF-IDF baseline on `train` and scores it on all of `test`.
    pub fn run_baseline(&self, train: &Dataset, test: &Dataset) -> Result<BenchmarkEntry> {
        let started = Instant::now();
        let mut vectorizer = TfidfVectorizer::from_config(&self.config.vectorizer);
        let x_train = vectorizer.fit_transform(train.documents())?;
        let mut classifier = LogisticRegression::from_config(&self.config.classifier);
        classifier.fit(&x_train, train.labels())?;

        let x_test = vectorizer.transform(test.documents())?;
        let predictions = classifier.predict(&x_test)?;
        let elapsed = started.elapsed().as_secs_f64();

        let correct = predictions
            .iter()
            .zip(test.labels())
            .filter(|(p, l)| p.as_str() == l.as_str())
            .count();
        let accuracy = if test.is_empty() {
            0.0
        } else {
            correct as f64 / test.len() as f64
        };
        log::info!("Baseline accuracy {:.3} on {} documents", accuracy, test.len());

        Ok(BenchmarkEntry {
            name: BASELINE_NAME.to_string(),
            kind: "baseline".to_string(),
            status: EntryStatus::Completed,
            accuracy,
            sample_size: test.len(),
            total_secs: elapsed,
            mean_secs: if test.is_empty() { 0.0 } else { elapsed / test.len() as f64 },
            examples: test
                .labels()
                .iter()
                .zip(predictions)
                .take(EXAMPLES_PER_MODEL)
                .map(|(expected, predicted)| ExamplePrediction {
                    expected: expected.clone(),
                    predicted,
                })
                .collect(),
        })
    }

    async fn run_model(&self, model: &PretrainedModel, sample: &[(&str, &str)]) -> BenchmarkEntry {
        let budget = Duration::from_secs(self.config.benchmark.timeout_secs);
        let started = Instant::now();
        let mut predictions = Vec::with_capacity(sample.len());

        for (index, (text, _)) in sample.iter().enumerate() {
            let outcome = match tokio::time::timeout(budget, model.classify(text)).await {
                Ok(result) => result,
                Err(_) => Err(ClassifierError::TimeoutError(format!(
                    "item {} exceeded {}s",
                    index, self.config.benchmark.timeout_secs
                ))),
            };
            match outcome {
                Ok(label) => predictions.push(label),
                Err(e) => {
                    log::warn!("Skipping {}: item {} failed: {}", model.name(), index, e);
                    return BenchmarkEntry::skipped(model.name(), model.kind(), e.to_string());
                }
            }
        }

        let total_secs = started.elapsed().as_secs_f64();
        let correct = predictions
            .iter()
            .zip(sample)
            .filter(|(predicted, (_, expected))| predicted.as_str() == *expected)
            .count();
        let accuracy = if sample.is_empty() {
            0.0
        } else {
            correct as f64 / sample.len() as f64
        };
        log::info!("{}: accuracy {:.3} in {:.2}s", model.name(), accuracy, total_secs);

        BenchmarkEntry {
            name: model.name().to_string(),
            kind: model.kind().to_string(),
            status: EntryStatus::Completed,
            accuracy,
            sample_size: sample.len(),
            total_secs,
            mean_secs: if sample.is_empty() { 0.0 } else { total_secs / sample.len() as f64 },
            examples: sample
                .iter()
                .zip(&predictions)
                .take(EXAMPLES_PER_MODEL)
                .map(|((_, expected), predicted)| ExamplePrediction {
                    expected: expected.to_string(),
                    predicted: predicted.clone(),
                })
                .collect(),
        }
    }
}
