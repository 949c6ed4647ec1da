//! Comparison of the TF-IDF baseline against pretrained text classifiers.
//!
//! Pretrained models come in two shapes. [`PretrainedModel::LabelMatching`]
//! backends (remote zero-shot, local embedding matcher) choose a personality
//! label directly. [`PretrainedModel::ScalarRemapping`] backends (remote or
//! lexicon sentiment) produce a score that a [`ThresholdTable`] turns into a
//! label.

mod harness;
mod lexicon;
mod pretrained;
mod remote;
mod thresholds;

pub use harness::{BenchmarkEntry, BenchmarkHarness, BenchmarkReport, EntryStatus, ExamplePrediction};
pub use lexicon::LexiconSentiment;
pub use pretrained::{LabelMatcher, PretrainedModel, PretrainedModelSpec, ScalarScorer};
pub use remote::{RemoteEndpoint, RemoteSentiment, RemoteZeroShot};
pub use thresholds::{ThresholdBucket, ThresholdTable};
