//! TF-IDF vectorizer over word n-grams.
//!
//! Documents are lowercased and split into tokens made of alphanumeric
//! characters (or `_`) of at least two characters, which keeps Hangul and
//! other non-Latin answers intact. N-grams are built from that token stream.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::VectorizerConfig;
use crate::error::{PipelineError, Result};

/// A sparse feature vector with a fixed dimension.
///
/// Entries are stored sorted by feature index; absent indices are zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    dim: usize,
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl FeatureVector {
    /// Builds a vector from `(index, value)` pairs already sorted by index.
    pub(crate) fn from_sorted(dim: usize, entries: impl IntoIterator<Item = (usize, f64)>) -> Self {
        let (indices, values) = entries.into_iter().unzip();
        Self { dim, indices, values }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of non-zero entries
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    pub fn dot(&self, dense: &ArrayView1<f64>) -> f64 {
        self.iter().map(|(i, v)| v * dense[i]).sum()
    }

    pub fn squared_norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum()
    }

    pub fn to_dense(&self) -> Vec<f64> {
        let mut dense = vec![0.0; self.dim];
        for (i, v) in self.iter() {
            dense[i] = v;
        }
        dense
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FittedVocabulary {
    /// Term to feature index; indices follow lexicographic term order
    terms: BTreeMap<String, usize>,
    idf: Vec<f64>,
    n_documents: usize,
}

/// TF-IDF vectorizer with a bounded unigram/bigram vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    max_features: usize,
    ngram_range: (usize, usize),
    normalize: bool,
    fitted: Option<FittedVocabulary>,
}

impl Default for TfidfVectorizer {
    fn default() -> Self {
        Self::from_config(&VectorizerConfig::default())
    }
}

impl TfidfVectorizer {
    pub fn new(max_features: usize, ngram_range: (usize, usize)) -> Self {
        Self {
            max_features,
            ngram_range,
            normalize: true,
            fitted: None,
        }
    }

    pub fn from_config(config: &VectorizerConfig) -> Self {
        Self {
            max_features: config.max_features,
            ngram_range: config.ngram_range,
            normalize: config.normalize,
            fitted: None,
        }
    }

    pub fn max_features(&self) -> usize {
        self.max_features
    }

    pub fn ngram_range(&self) -> (usize, usize) {
        self.ngram_range
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Size of the fitted vocabulary, which is also the width of every
    /// transformed vector. Zero before fitting.
    pub fn vocabulary_size(&self) -> usize {
        self.fitted.as_ref().map_or(0, |v| v.idf.len())
    }

    /// Feature index of a term, if it made it into the vocabulary
    pub fn feature_index(&self, term: &str) -> Option<usize> {
        self.fitted.as_ref().and_then(|v| v.terms.get(term).copied())
    }

    /// Learns the vocabulary and idf weights from `documents`.
    ///
    /// Re-fitting throws away the previous vocabulary completely. Any
    /// classifier fitted on vectors from the old vocabulary is invalid
    /// afterwards; the trainer always pairs a fresh vectorizer with a fresh
    /// classifier for that reason.
    pub fn fit<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<()> {
        if documents.is_empty() {
            return Err(PipelineError::InsufficientData(
                "cannot fit a vectorizer on zero documents".into(),
            ));
        }

        let mut term_counts: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for doc in documents {
            let terms = self.analyze(doc.as_ref());
            let mut seen = HashSet::new();
            for term in terms {
                if seen.insert(term.clone()) {
                    *doc_freq.entry(term.clone()).or_insert(0) += 1;
                }
                *term_counts.entry(term).or_insert(0) += 1;
            }
        }

        if term_counts.is_empty() {
            return Err(PipelineError::InsufficientData(
                "documents contain no usable terms".into(),
            ));
        }

        // Most frequent terms win; equal counts fall back to term order so the
        // cut is deterministic.
        let mut ranked: Vec<(String, usize)> = term_counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(self.max_features);

        let mut kept: Vec<String> = ranked.into_iter().map(|(term, _)| term).collect();
        kept.sort();

        let n_documents = documents.len();
        let n = n_documents as f64;
        let idf = kept
            .iter()
            .map(|term| {
                let df = doc_freq.get(term).copied().unwrap_or(0) as f64;
                ((1.0 + n) / (1.0 + df)).ln() + 1.0
            })
            .collect();
        let terms = kept.into_iter().enumerate().map(|(i, t)| (t, i)).collect();

        self.fitted = Some(FittedVocabulary {
            terms,
            idf,
            n_documents,
        });
        log::debug!(
            "Fitted TF-IDF vocabulary: {} terms from {} documents",
            self.vocabulary_size(),
            n_documents
        );
        Ok(())
    }

    /// Maps one document onto the fitted vocabulary.
    pub fn transform_one(&self, document: &str) -> Result<FeatureVector> {
        let fitted = self.fitted.as_ref().ok_or(PipelineError::VectorizerNotFitted)?;

        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for term in self.analyze(document) {
            if let Some(&idx) = fitted.terms.get(&term) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut weighted: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(idx, tf)| (idx, tf * fitted.idf[idx]))
            .collect();

        if self.normalize {
            let norm = weighted.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                for (_, v) in &mut weighted {
                    *v /= norm;
                }
            }
        }

        Ok(FeatureVector::from_sorted(fitted.idf.len(), weighted))
    }

    /// Maps documents onto the fitted vocabulary without refitting.
    /// Unknown terms contribute nothing.
    pub fn transform<S: AsRef<str>>(&self, documents: &[S]) -> Result<Vec<FeatureVector>> {
        documents
            .iter()
            .map(|doc| self.transform_one(doc.as_ref()))
            .collect()
    }

    pub fn fit_transform<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<Vec<FeatureVector>> {
        self.fit(documents)?;
        self.transform(documents)
    }

    fn analyze(&self, document: &str) -> Vec<String> {
        let tokens = tokenize(document);
        let (min_n, max_n) = self.ngram_range;
        let mut terms = Vec::new();
        for n in min_n.max(1)..=max_n {
            if n == 1 {
                terms.extend(tokens.iter().cloned());
            } else {
                terms.extend(tokens.windows(n).map(|w| w.join(" ")));
            }
        }
        terms
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<&'static str> {
        vec![
            "I love collecting rare items and achievements",
            "I enjoy discovering new maps and hidden areas",
            "Rare items are the best part of collecting",
            "Exploring hidden areas and new maps is fun",
        ]
    }

    #[test]
    fn test_fixed_output_width() -> Result<()> {
        let mut vectorizer = TfidfVectorizer::default();
        vectorizer.fit(&corpus())?;
        let short = vectorizer.transform_one("rare")?;
        let long = vectorizer.transform_one("completely unrelated words about cooking pasta")?;
        assert_eq!(short.dim(), vectorizer.vocabulary_size());
        assert_eq!(short.dim(), long.dim());
        assert_eq!(long.nnz(), 0);
        Ok(())
    }

    #[test]
    fn test_transform_is_idempotent() -> Result<()> {
        let mut vectorizer = TfidfVectorizer::default();
        vectorizer.fit(&corpus())?;
        let first = vectorizer.transform_one("I love rare items and hidden maps")?;
        let second = vectorizer.transform_one("I love rare items and hidden maps")?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_not_fitted() {
        let vectorizer = TfidfVectorizer::default();
        assert!(matches!(
            vectorizer.transform(&["anything"]),
            Err(PipelineError::VectorizerNotFitted)
        ));
    }

    #[test]
    fn test_unigrams_and_bigrams() -> Result<()> {
        let mut vectorizer = TfidfVectorizer::default();
        vectorizer.fit(&corpus())?;
        assert!(vectorizer.feature_index("rare").is_some());
        assert!(vectorizer.feature_index("rare items").is_some());
        assert!(vectorizer.feature_index("hidden areas").is_some());
        // single-character tokens are dropped
        assert!(vectorizer.feature_index("i").is_none());
        Ok(())
    }

    #[test]
    fn test_vocabulary_cap_keeps_most_frequent() -> Result<()> {
        let mut vectorizer = TfidfVectorizer::new(3, (1, 1));
        vectorizer.fit(&["alpha alpha alpha beta beta gamma delta", "alpha beta gamma"])?;
        assert_eq!(vectorizer.vocabulary_size(), 3);
        assert!(vectorizer.feature_index("alpha").is_some());
        assert!(vectorizer.feature_index("beta").is_some());
        assert!(vectorizer.feature_index("gamma").is_some());
        assert!(vectorizer.feature_index("delta").is_none());
        Ok(())
    }

    #[test]
    fn test_tfidf_weighting() -> Result<()> {
        let mut vectorizer = TfidfVectorizer::new(10, (1, 1));
        vectorizer.normalize = false;
        vectorizer.fit(&["shared rare", "shared common"])?;
        let vector = vectorizer.transform_one("shared shared rare")?;
        let dense = vector.to_dense();

        let shared = vectorizer.feature_index("shared").unwrap();
        let rare = vectorizer.feature_index("rare").unwrap();
        // shared: tf 2, df 2 -> idf ln(3/3) + 1 = 1
        assert!((dense[shared] - 2.0).abs() < 1e-12);
        // rare: tf 1, df 1 -> idf ln(3/2) + 1
        assert!((dense[rare] - ((1.5f64).ln() + 1.0)).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_normalized_vectors_have_unit_length() -> Result<()> {
        let mut vectorizer = TfidfVectorizer::default();
        let vectors = vectorizer.fit_transform(&corpus())?;
        for vector in vectors {
            assert!((vector.squared_norm() - 1.0).abs() < 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_hangul_tokens() -> Result<()> {
        let mut vectorizer = TfidfVectorizer::default();
        vectorizer.fit(&["저는 팀을 이끄는 것을 좋아합니다", "신중하게 계획을 세웁니다"])?;
        assert!(vectorizer.feature_index("팀을").is_some());
        assert!(vectorizer.feature_index("팀을 이끄는").is_some());
        Ok(())
    }

    #[test]
    fn test_refit_discards_vocabulary() -> Result<()> {
        let mut vectorizer = TfidfVectorizer::default();
        vectorizer.fit(&corpus())?;
        assert!(vectorizer.feature_index("rare").is_some());
        vectorizer.fit(&["completely different words here"])?;
        assert!(vectorizer.feature_index("rare").is_none());
        assert!(vectorizer.feature_index("different").is_some());
        Ok(())
    }

    #[test]
    fn test_empty_corpus() {
        let mut vectorizer = TfidfVectorizer::default();
        let empty: [&str; 0] = [];
        assert!(matches!(vectorizer.fit(&empty), Err(PipelineError::InsufficientData(_))));
        assert!(matches!(vectorizer.fit(&["a b c"]), Err(PipelineError::InsufficientData(_))));
    }
}
