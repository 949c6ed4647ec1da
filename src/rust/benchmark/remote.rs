//! Clients for hosted text-classification inference endpoints.
//!
//! Requests and responses follow the Hugging Face inference API: a JSON body
//! with `inputs` (plus `parameters.candidate_labels` for zero-shot), answered
//! with label/score lists.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::embedding::ClassifierError;

const TOKEN_ENV: &str = "HF_API_TOKEN";
const SENTIMENT_MAX_CHARS: usize = 512;

#[derive(Debug, Clone, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ZeroShotResponse {
    Ranked { labels: Vec<String>, scores: Vec<f64> },
    Pairs(Vec<LabelScore>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SentimentResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

/// Highest-scoring pair; the earliest one wins a tie.
fn best_of(pairs: impl IntoIterator<Item = (String, f64)>) -> Option<(String, f64)> {
    let mut best: Option<(String, f64)> = None;
    for (label, score) in pairs {
        if best.as_ref().map_or(true, |(_, top)| score > *top) {
            best = Some((label, score));
        }
    }
    best
}

fn top_zero_shot_label(response: ZeroShotResponse) -> Result<String, ClassifierError> {
    let best = match response {
        ZeroShotResponse::Ranked { labels, scores } => best_of(labels.into_iter().zip(scores)),
        ZeroShotResponse::Pairs(pairs) => best_of(pairs.into_iter().map(|p| (p.label, p.score))),
    };
    best.map(|(label, _)| label)
        .ok_or_else(|| ClassifierError::RemoteError("zero-shot response contained no labels".into()))
}

/// Probability of positive sentiment: the top score when the top label is
/// positive, its complement otherwise.
fn positive_probability(response: SentimentResponse) -> Result<f64, ClassifierError> {
    let pairs = match response {
        SentimentResponse::Nested(nested) => nested.into_iter().flatten().collect(),
        SentimentResponse::Flat(flat) => flat,
    };
    let (label, score) = best_of(pairs.into_iter().map(|p| (p.label, p.score)))
        .ok_or_else(|| ClassifierError::RemoteError("sentiment response contained no labels".into()))?;

    if label.eq_ignore_ascii_case("positive") {
        Ok(score)
    } else {
        Ok(1.0 - score)
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// One hosted model endpoint with a bounded request time.
#[derive(Debug, Clone)]
pub struct RemoteEndpoint {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl RemoteEndpoint {
    /// Bearer token is read from `HF_API_TOKEN` when set.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifierError::BuildError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
            token: std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty()),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post<T: DeserializeOwned>(&self, body: serde_json::Value) -> Result<T, ClassifierError> {
        let mut request = self.client.post(&self.url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ClassifierError::RemoteError(format!(
                "{} returned {}: {}",
                self.url,
                status,
                truncate_chars(&text, 200)
            )));
        }
        serde_json::from_str(&text).map_err(|e| {
            ClassifierError::RemoteError(format!(
                "unexpected response from {}: {} ({})",
                self.url,
                e,
                truncate_chars(&text, 200)
            ))
        })
    }
}

/// Zero-shot classification over caller-supplied candidate labels
#[derive(Debug, Clone)]
pub struct RemoteZeroShot {
    endpoint: RemoteEndpoint,
}

impl RemoteZeroShot {
    pub fn new(endpoint: RemoteEndpoint) -> Self {
        Self { endpoint }
    }

    pub async fn classify(&self, text: &str, labels: &[String]) -> Result<String, ClassifierError> {
        if labels.is_empty() {
            return Err(ClassifierError::ValidationError("no candidate labels".into()));
        }
        let response: ZeroShotResponse = self
            .endpoint
            .post(json!({
                "inputs": text,
                "parameters": { "candidate_labels": labels },
            }))
            .await?;
        top_zero_shot_label(response)
    }
}

/// Sentiment model reduced to a positive-probability scalar
#[derive(Debug, Clone)]
pub struct RemoteSentiment {
    endpoint: RemoteEndpoint,
}

impl RemoteSentiment {
    pub fn new(endpoint: RemoteEndpoint) -> Self {
        Self { endpoint }
    }

    /// Input is cut to its first 512 characters.
    pub async fn score(&self, text: &str) -> Result<f64, ClassifierError> {
        let response: SentimentResponse = self
            .endpoint
            .post(json!({ "inputs": truncate_chars(text, SENTIMENT_MAX_CHARS) }))
            .await?;
        positive_probability(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_shot_formats() -> Result<(), Box<dyn std::error::Error>> {
        let ranked: ZeroShotResponse = serde_json::from_str(
            r#"{"sequence": "x", "labels": ["리더형", "감성형"], "scores": [0.2, 0.8]}"#,
        )?;
        assert_eq!(top_zero_shot_label(ranked)?, "감성형");

        let pairs: ZeroShotResponse =
            serde_json::from_str(r#"[{"label": "a", "score": 0.6}, {"label": "b", "score": 0.4}]"#)?;
        assert_eq!(top_zero_shot_label(pairs)?, "a");

        let empty: ZeroShotResponse = serde_json::from_str("[]")?;
        assert!(matches!(top_zero_shot_label(empty), Err(ClassifierError::RemoteError(_))));
        Ok(())
    }

    #[test]
    fn test_sentiment_formats() -> Result<(), Box<dyn std::error::Error>> {
        let nested: SentimentResponse = serde_json::from_str(
            r#"[[{"label": "negative", "score": 0.1}, {"label": "neutral", "score": 0.2}, {"label": "positive", "score": 0.7}]]"#,
        )?;
        assert!((positive_probability(nested)? - 0.7).abs() < 1e-12);

        let flat: SentimentResponse = serde_json::from_str(r#"[{"label": "NEGATIVE", "score": 0.9}]"#)?;
        assert!((positive_probability(flat)? - 0.1).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 2), "he");
        assert_eq!(truncate_chars("가나다라", 2), "가나");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() -> Result<(), ClassifierError> {
        let endpoint = RemoteEndpoint::new("http://127.0.0.1:9/models/none", Duration::from_secs(2))?;
        let result = RemoteSentiment::new(endpoint).score("hello").await;
        assert!(matches!(
            result,
            Err(ClassifierError::RemoteError(_)) | Err(ClassifierError::TimeoutError(_))
        ));
        Ok(())
    }
}
