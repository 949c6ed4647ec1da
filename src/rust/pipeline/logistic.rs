//! One-vs-rest logistic regression over sparse TF-IDF features.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::vectorizer::FeatureVector;
use crate::config::ClassifierConfig;
use crate::error::{PipelineError, Result};

/// Multi-class logistic regression, one binary model per label.
///
/// Labels are kept in lexicographic order. That order is the index order of
/// every probability vector this model returns, and it also decides ties:
/// when several labels share the maximum probability, the first one wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    c: f64,
    max_iter: usize,
    tolerance: f64,
    classes: Vec<String>,
    /// One row of weights per class
    weights: Array2<f64>,
    intercepts: Array1<f64>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::from_config(&ClassifierConfig::default())
    }
}

impl LogisticRegression {
    pub fn new(c: f64, max_iter: usize, tolerance: f64) -> Self {
        Self {
            c,
            max_iter,
            tolerance,
            classes: Vec::new(),
            weights: Array2::zeros((0, 0)),
            intercepts: Array1::zeros(0),
        }
    }

    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self::new(config.c, config.max_iter, config.tolerance)
    }

    /// Labels in probability-index order
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_features(&self) -> usize {
        self.weights.ncols()
    }

    pub fn is_fitted(&self) -> bool {
        !self.classes.is_empty()
    }

    /// Fits one regularized binary model per distinct label.
    ///
    /// Minimizes the mean log-loss plus `||w||² / (2·c·n)` by full-batch
    /// gradient descent. The step size is the inverse of the loss's Lipschitz
    /// bound, so training is deterministic and needs no tuning.
    pub fn fit<S: AsRef<str>>(&mut self, features: &[FeatureVector], labels: &[S]) -> Result<()> {
        if features.len() != labels.len() {
            return Err(PipelineError::InsufficientData(format!(
                "{} feature vectors but {} labels",
                features.len(),
                labels.len()
            )));
        }
        if features.is_empty() {
            return Err(PipelineError::InsufficientData("no training samples".into()));
        }

        let n_features = features[0].dim();
        if let Some(bad) = features.iter().find(|f| f.dim() != n_features) {
            return Err(PipelineError::DimensionMismatch {
                expected: n_features,
                actual: bad.dim(),
            });
        }

        let classes: Vec<String> = labels
            .iter()
            .map(|l| l.as_ref().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if classes.len() < 2 {
            return Err(PipelineError::InsufficientData(format!(
                "need at least 2 distinct labels, found {}",
                classes.len()
            )));
        }

        let n = features.len() as f64;
        let lambda = 1.0 / (self.c * n);
        let max_sq_norm = features
            .iter()
            .map(FeatureVector::squared_norm)
            .fold(0.0, f64::max);
        // sigmoid' <= 1/4 and the intercept adds a constant 1 input
        let lipschitz = 0.25 * (max_sq_norm + 1.0) + lambda;
        let step = 1.0 / lipschitz;

        let mut weights = Array2::zeros((classes.len(), n_features));
        let mut intercepts = Array1::zeros(classes.len());

        for (k, class) in classes.iter().enumerate() {
            let targets: Vec<f64> = labels
                .iter()
                .map(|l| if l.as_ref() == class { 1.0 } else { 0.0 })
                .collect();
            let (w, b, iterations) = self.fit_binary(features, &targets, n_features, lambda, step);
            log::debug!("Class '{}' converged after {} iterations", class, iterations);
            weights.row_mut(k).assign(&w);
            intercepts[k] = b;
        }

        self.classes = classes;
        self.weights = weights;
        self.intercepts = intercepts;
        Ok(())
    }

    fn fit_binary(
        &self,
        features: &[FeatureVector],
        targets: &[f64],
        n_features: usize,
        lambda: f64,
        step: f64,
    ) -> (Array1<f64>, f64, usize) {
        let n = features.len() as f64;
        let mut w = Array1::<f64>::zeros(n_features);
        let mut b = 0.0;

        for iteration in 1..=self.max_iter {
            let mut grad_w = &w * lambda;
            let mut grad_b = 0.0;
            for (x, &y) in features.iter().zip(targets) {
                let residual = (sigmoid(x.dot(&w.view()) + b) - y) / n;
                for (i, v) in x.iter() {
                    grad_w[i] += residual * v;
                }
                grad_b += residual;
            }

            let max_grad = grad_w.iter().fold(grad_b.abs(), |m, g| m.max(g.abs()));
            w.scaled_add(-step, &grad_w);
            b -= step * grad_b;

            if max_grad < self.tolerance {
                return (w, b, iteration);
            }
        }
        (w, b, self.max_iter)
    }

    fn check_dim(&self, x: &FeatureVector) -> Result<()> {
        if !self.is_fitted() {
            return Err(PipelineError::ModelNotReady);
        }
        if x.dim() != self.n_features() {
            return Err(PipelineError::DimensionMismatch {
                expected: self.n_features(),
                actual: x.dim(),
            });
        }
        Ok(())
    }

    /// Probability distribution for one vector, in [`classes`](Self::classes) order.
    pub fn predict_proba_one(&self, x: &FeatureVector) -> Result<Vec<f64>> {
        self.check_dim(x)?;
        let scores: Vec<f64> = self
            .weights
            .outer_iter()
            .zip(self.intercepts.iter())
            .map(|(w, &b)| sigmoid(x.dot(&w) + b))
            .collect();

        let total: f64 = scores.iter().sum();
        if total > 0.0 && total.is_finite() {
            Ok(scores.into_iter().map(|s| s / total).collect())
        } else {
            let uniform = 1.0 / self.classes.len() as f64;
            Ok(vec![uniform; self.classes.len()])
        }
    }

    pub fn predict_proba(&self, features: &[FeatureVector]) -> Result<Vec<Vec<f64>>> {
        features.iter().map(|x| self.predict_proba_one(x)).collect()
    }

    pub fn predict_one(&self, x: &FeatureVector) -> Result<String> {
        let proba = self.predict_proba_one(x)?;
        Ok(self.classes[argmax(&proba)].clone())
    }

    pub fn predict(&self, features: &[FeatureVector]) -> Result<Vec<String>> {
        features.iter().map(|x| self.predict_one(x)).collect()
    }

    /// Fraction of `features` whose prediction matches the true label.
    pub fn score<S: AsRef<str>>(&self, features: &[FeatureVector], labels: &[S]) -> Result<f64> {
        if features.len() != labels.len() {
            return Err(PipelineError::InsufficientData(format!(
                "{} feature vectors but {} labels",
                features.len(),
                labels.len()
            )));
        }
        if features.is_empty() {
            return Ok(0.0);
        }
        let predictions = self.predict(features)?;
        let correct = predictions
            .iter()
            .zip(labels)
            .filter(|(p, l)| p.as_str() == l.as_ref())
            .count();
        Ok(correct as f64 / features.len() as f64)
    }
}

/// Index of the largest value; the earliest index wins a tie.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
