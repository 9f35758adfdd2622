
pub mod local;
pub mod remote;

pub use local::LocalEmbeddingProvider;
pub use remote::RemoteEmbeddingProvider;

use crate::{DocqaError, Result};

/// Maximum characters fed to an embedding backend after preprocessing.
/// Matches the input budget of the multilingual embedding models in use.
const MAX_INPUT_CHARS: usize = 4000;

/// Punctuation preserved by preprocessing, in addition to word characters
/// and the Hangul ranges.
const ALLOWED_PUNCTUATION: &str = ".,!?;:()[]{}\"'`~@#$%^&*+=|\\/<>-_。！？";

/// A vector produced for exactly one chunk, tagged with the model that
/// produced it. Degraded entries stand in for per-item embedding failures
/// during bulk indexing; their vector is all zeros.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub model: String,
    pub degraded: bool,
}

impl Embedding {
    #[inline]
    pub fn new(vector: Vec<f32>, model: &str) -> Self {
        Self {
            vector,
            model: model.to_string(),
            degraded: false,
        }
    }

    /// Failure marker for one item of a batch: a zero vector of the right
    /// dimension, flagged so downstream consumers can tell it apart from a
    /// real embedding.
    #[inline]
    pub fn degraded(dimension: usize, model: &str) -> Self {
        Self {
            vector: vec![0.0; dimension],
            model: model.to_string(),
            degraded: true,
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// Contract for turning text into fixed-dimension vectors.
///
/// Implementations declare their model name and dimension up front; every
/// vector they hand out must have exactly that dimension. Backends are
/// selected once at startup by configuration, not by runtime fallback.
pub trait EmbeddingProvider: Send + Sync {
    fn model_name(&self) -> &str;

    fn dimension(&self) -> usize;

    /// Embed a single text. Fails with [`DocqaError::EmptyInput`] when the
    /// text is blank after preprocessing and with
    /// [`DocqaError::DimensionMismatch`] when the backend returns a vector
    /// of the wrong length.
    fn embed_one(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts in batches. A failure on one item never aborts the
    /// rest; the failed item is replaced with a degraded zero-vector marker
    /// and processing continues.
    fn embed_many(&self, texts: &[String]) -> Vec<Embedding>;
}

/// Normalize text before embedding: trim, collapse whitespace, strip
/// characters outside the allow-list (word characters, common punctuation,
/// Hangul), squash runs of sentence terminators, and cap the length.
#[inline]
pub fn preprocess(text: &str) -> String {
    let mut result = String::with_capacity(text.len().min(MAX_INPUT_CHARS));
    let mut kept = 0usize;
    let mut pending_space = false;
    let mut previous: Option<char> = None;

    for c in text.trim().chars() {
        if c.is_whitespace() {
            pending_space = !result.is_empty();
            continue;
        }
        if !is_allowed_char(c) {
            continue;
        }
        // Collapse runs like "..." or "!!" down to a single terminator.
        if matches!(c, '.' | '!' | '?') && previous == Some(c) && !pending_space {
            continue;
        }
        if pending_space {
            result.push(' ');
            kept += 1;
            pending_space = false;
        }
        result.push(c);
        kept += 1;
        previous = Some(c);

        if kept >= MAX_INPUT_CHARS {
            break;
        }
    }

    result
}

fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || is_hangul(c) || ALLOWED_PUNCTUATION.contains(c)
}

fn is_hangul(c: char) -> bool {
    matches!(c, '\u{AC00}'..='\u{D7A3}' | '\u{1100}'..='\u{11FF}' | '\u{3130}'..='\u{318F}')
}

/// Cosine similarity clamped to `[0, 1]`.
///
/// Negative cosine is treated as no relevance rather than anti-relevance,
/// since ranking only cares about degrees of positive match. Zero-magnitude
/// vectors score 0. Mismatched lengths are an error, never a number.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(DocqaError::DimensionMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f32::EPSILON {
        return Ok(0.0);
    }

    Ok((dot / denom).clamp(0.0, 1.0))
}
