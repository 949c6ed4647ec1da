//! Sentence-embedding label matcher backed by a local ONNX encoder.
//!
//! Each candidate label gets a prototype: the normalized mean embedding of the
//! label name, its optional description and any example texts. A text is
//! assigned the label whose prototype has the highest cosine similarity.

mod embedding;
mod error;
mod matcher;
mod utils;

pub use error::ClassifierError;
pub use matcher::{EmbeddingMatcher, EmbeddingMatcherBuilder, LabelDefinition};
