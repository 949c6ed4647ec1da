//! Labeled interview sessions and their flattening into documents.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// One question/answer exchange of an interview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

/// A labeled interview: the personality type plus every exchange, in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewSession {
    pub personality_type: String,
    pub questions_answers: Vec<QaPair>,
}

impl InterviewSession {
    /// Space-joins every answer in original order.
    pub fn document(&self) -> String {
        self.questions_answers
            .iter()
            .map(|qa| qa.answer.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// Wire shape with every field optional so a missing key becomes a precise
// DatasetMalformed message instead of a generic serde error.
#[derive(Deserialize)]
struct RawSession {
    personality_type: Option<String>,
    questions_answers: Option<Vec<RawQaPair>>,
}

#[derive(Deserialize)]
struct RawQaPair {
    question: Option<String>,
    answer: Option<String>,
}

/// Index-aligned documents and labels ready for vectorization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    documents: Vec<String>,
    labels: Vec<String>,
}

impl Dataset {
    pub fn new(documents: Vec<String>, labels: Vec<String>) -> Result<Self> {
        if documents.len() != labels.len() {
            return Err(PipelineError::DatasetMalformed(format!(
                "{} documents but {} labels",
                documents.len(),
                labels.len()
            )));
        }
        Ok(Self { documents, labels })
    }

    pub fn from_sessions(sessions: &[InterviewSession]) -> Result<Self> {
        let mut documents = Vec::with_capacity(sessions.len());
        let mut labels = Vec::with_capacity(sessions.len());
        for (index, session) in sessions.iter().enumerate() {
            validate_session(index, session)?;
            documents.push(session.document());
            labels.push(session.personality_type.clone());
        }
        Ok(Self { documents, labels })
    }

    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of sessions per label, sorted by label
    pub fn label_distribution(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(label.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Picks the rows at `indices`, in that order.
    pub(crate) fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            documents: indices.iter().map(|&i| self.documents[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i].clone()).collect(),
        }
    }
}

fn validate_session(index: usize, session: &InterviewSession) -> Result<()> {
    if session.personality_type.trim().is_empty() {
        return Err(PipelineError::DatasetMalformed(format!(
            "session {} has an empty personality_type",
            index
        )));
    }
    if session.questions_answers.is_empty() {
        return Err(PipelineError::DatasetMalformed(format!(
            "session {} has no questions_answers",
            index
        )));
    }
    Ok(())
}

/// Parses interview sessions from a JSON array.
///
/// Sessions with an empty label or zero QA pairs fail the whole load: an
/// answer-less document carries no signal and would only dilute the idf
/// statistics.
pub fn parse_sessions(json: &str) -> Result<Vec<InterviewSession>> {
    let raw: Vec<RawSession> = serde_json::from_str(json)
        .map_err(|e| PipelineError::DatasetMalformed(format!("invalid JSON: {}", e)))?;

    raw.into_iter()
        .enumerate()
        .map(|(index, session)| {
            let personality_type = session.personality_type.ok_or_else(|| {
                PipelineError::DatasetMalformed(format!(
                    "session {} is missing personality_type",
                    index
                ))
            })?;
            let pairs = session.questions_answers.ok_or_else(|| {
                PipelineError::DatasetMalformed(format!(
                    "session {} is missing questions_answers",
                    index
                ))
            })?;
            let questions_answers = pairs
                .into_iter()
                .enumerate()
                .map(|(qa_index, qa)| {
                    let answer = qa.answer.ok_or_else(|| {
                        PipelineError::DatasetMalformed(format!(
                            "session {} answer {} is missing the answer field",
                            index, qa_index
                        ))
                    })?;
                    Ok(QaPair {
                        question: qa.question.unwrap_or_default(),
                        answer,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let session = InterviewSession {
                personality_type,
                questions_answers,
            };
            validate_session(index, &session)?;
            Ok(session)
        })
        .collect()
}

/// Reads sessions from a dataset file.
pub fn load_sessions<P: AsRef<Path>>(path: P) -> Result<Vec<InterviewSession>> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => PipelineError::DatasetNotFound(path.display().to_string()),
        _ => PipelineError::DatasetMalformed(format!("cannot read {}: {}", path.display(), e)),
    })?;
    parse_sessions(&json)
}

/// Loads a dataset file into index-aligned documents and labels.
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let path = path.as_ref();
    let sessions = load_sessions(path)?;
    let dataset = Dataset::from_sessions(&sessions)?;
    let distribution = dataset.label_distribution();
    log::info!(
        "Loaded {} sessions with {} personality types from {:?}",
        dataset.len(),
        distribution.len(),
        path
    );
    for (label, count) in &distribution {
        log::debug!("  {}: {}", label, count);
    }
    Ok(dataset)
}
