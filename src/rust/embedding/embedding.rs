use ndarray::{Array1, Array2};
use ort::session::Session;
use ort::value::Tensor;
use std::collections::HashMap;
use tokenizers::Tokenizer;

use super::error::ClassifierError;
use super::utils::normalize_vector;

/// Text to unit-length sentence embedding through an ONNX encoder.
///
/// The model takes `input_ids` and `attention_mask` of shape
/// `[1, sequence_length]` and returns `[1, sequence_length, embedding_size]`;
/// the first token's vector is the sentence embedding.
pub(crate) trait TextEmbedding {
    fn tokenizer(&self) -> Option<&Tokenizer>;

    fn session(&self) -> Option<&Session>;

    fn max_sequence_length(&self) -> Option<usize>;

    fn count_tokens(&self, text: &str) -> Result<usize, ClassifierError> {
        let tokenizer = self
            .tokenizer()
            .ok_or_else(|| ClassifierError::TokenizerError("Tokenizer not initialized".into()))?;

        tokenizer
            .encode(text, false)
            .map_err(|e| ClassifierError::TokenizerError(e.to_string()))
            .map(|encoding| encoding.get_ids().len())
    }

    /// Token ids for `text`, cut to the model's maximum sequence length.
    ///
    /// Interview answers routinely run past the encoder's window; the head of
    /// the text is kept and the rest dropped with a debug log.
    fn tokenize(&self, text: &str) -> Result<Vec<u32>, ClassifierError> {
        let tokenizer = self
            .tokenizer()
            .ok_or_else(|| ClassifierError::TokenizerError("Tokenizer not initialized".into()))?;
        let max_length = self
            .max_sequence_length()
            .ok_or_else(|| ClassifierError::TokenizerError("Max sequence length not set".into()))?;

        let encoding = tokenizer
            .encode(text, false)
            .map_err(|e| ClassifierError::TokenizerError(e.to_string()))?;
        let mut token_ids = encoding.get_ids().to_vec();

        if token_ids.is_empty() {
            return Err(ClassifierError::ValidationError(
                "Input text produced no tokens".into(),
            ));
        }
        if token_ids.len() > max_length {
            log::debug!(
                "Truncating input from {} to {} tokens",
                token_ids.len(),
                max_length
            );
            token_ids.truncate(max_length);
        }
        Ok(token_ids)
    }

    fn embed_text(&self, text: &str) -> Result<Array1<f32>, ClassifierError> {
        let tokens = self.tokenize(text)?;
        self.get_embedding(&tokens)
    }

    fn get_embedding(&self, tokens: &[u32]) -> Result<Array1<f32>, ClassifierError> {
        let session = self
            .session()
            .ok_or_else(|| ClassifierError::ModelError("Session not initialized".into()))?;

        let input_array = Array2::from_shape_vec(
            (1, tokens.len()),
            tokens.iter().map(|&x| x as i64).collect(),
        )
        .map_err(|e| ClassifierError::ModelError(format!("Failed to create input array: {}", e)))?;
        let input_dyn = input_array.into_dyn();
        let input_ids = input_dyn.as_standard_layout();

        let mask_array = Array2::from_shape_vec(
            (1, tokens.len()),
            tokens.iter().map(|&x| if x == 0 { 0i64 } else { 1i64 }).collect(),
        )
        .map_err(|e| ClassifierError::ModelError(format!("Failed to create mask array: {}", e)))?;
        let mask_dyn = mask_array.into_dyn();
        let attention_mask = mask_dyn.as_standard_layout();

        let mut input_tensors = HashMap::new();
        input_tensors.insert(
            "input_ids",
            Tensor::from_array(&input_ids).map_err(|e| {
                ClassifierError::ModelError(format!("Failed to create input tensor: {}", e))
            })?,
        );
        input_tensors.insert(
            "attention_mask",
            Tensor::from_array(&attention_mask).map_err(|e| {
                ClassifierError::ModelError(format!("Failed to create mask tensor: {}", e))
            })?,
        );

        let outputs = session
            .run(input_tensors)
            .map_err(|e| ClassifierError::ModelError(format!("Failed to run model: {}", e)))?;
        let output_tensor = outputs[0].try_extract_tensor::<f32>().map_err(|e| {
            ClassifierError::ModelError(format!("Failed to extract output tensor: {}", e))
        })?;

        if output_tensor.ndim() != 3 {
            return Err(ClassifierError::ModelError(format!(
                "Expected a rank-3 output, got shape {:?}",
                output_tensor.shape()
            )));
        }
        let embedding: Array1<f32> = output_tensor
            .slice(ndarray::s![0, 0, ..])
            .iter()
            .cloned()
            .collect();

        Ok(normalize_vector(&embedding))
    }
}
