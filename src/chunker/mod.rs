
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Sentence terminators recognized when trimming a window back to a
/// sentence boundary. Includes the fullwidth forms used in Korean and
/// other CJK text.
const SENTENCE_TERMINATORS: [char; 6] = ['.', '!', '?', '。', '！', '？'];

/// Fraction of the window that must be filled before a sentence boundary
/// is accepted as the chunk end.
const BOUNDARY_FLOOR_RATIO: f64 = 0.6;

/// A contiguous slice of a document's text, the retrievable unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Sequential index within the document.
    pub index: usize,
    /// Trimmed chunk text.
    pub content: String,
    /// Character offset of the window start in the source text.
    pub start: usize,
    /// Character offset one past the window end.
    pub end: usize,
    /// Page number, derived only for page-oriented sources.
    pub page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in characters.
    pub chunk_size: usize,
    /// Overlap carried from one window into the next, in characters.
    pub overlap: usize,
    /// Characters per page for page-oriented sources. None for flowing text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_char_hint: Option<usize>,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 800,
            overlap: 150,
            page_char_hint: None,
        }
    }
}

/// Split text into overlapping, sentence-bounded chunks.
///
/// Empty or whitespace-only input yields an empty list. Non-empty input is
/// guaranteed to yield at least one chunk, and every chunk is non-empty
/// after trimming. Deterministic for a fixed input and configuration.
#[inline]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<TextChunk> {
    let mut chunks = Vec::new();

    if text.trim().is_empty() {
        return chunks;
    }

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let window = config.chunk_size.max(1);
    let overlap = config.overlap.min(window.saturating_sub(1));

    // Upper bound on iterations for a well-behaved scan. Exceeding it means
    // the advance logic is wedged; stop and keep what was produced.
    let step = (window - overlap).max(1);
    let max_iterations = total.div_ceil(step) + 4;

    let mut position = 0;
    let mut index = 0;
    let mut iterations = 0;

    while position < total {
        iterations += 1;
        if iterations > max_iterations {
            warn!(
                "chunking exceeded {} iterations at position {}/{}, stopping early",
                max_iterations, position, total
            );
            break;
        }

        let window_end = (position + window).min(total);
        let end = if window_end < total {
            sentence_bounded_end(&chars, position, window_end)
        } else {
            window_end
        };

        let content: String = chars[position..end].iter().collect();
        let trimmed = content.trim();
        if !trimmed.is_empty() {
            chunks.push(TextChunk {
                index,
                content: trimmed.to_string(),
                start: position,
                end,
                page: page_for_offset(position, config.page_char_hint),
            });
            index += 1;
        }

        if end >= total {
            break;
        }

        // Always move forward by at least one character so an oversized
        // overlap cannot stall the scan.
        position = end.saturating_sub(overlap).max(position + 1);
    }

    // No-loss guarantee: non-empty input must produce at least one chunk.
    if chunks.is_empty() {
        chunks.push(TextChunk {
            index: 0,
            content: text.trim().to_string(),
            start: 0,
            end: total,
            page: page_for_offset(0, config.page_char_hint),
        });
    }

    debug!(
        "chunked {} chars into {} chunks (window {}, overlap {})",
        total,
        chunks.len(),
        window,
        overlap
    );

    chunks
}

/// Search backward from the window end for the nearest sentence terminator
/// that still leaves the chunk at least 60% full. Returns the window end
/// unchanged when no acceptable boundary exists.
fn sentence_bounded_end(chars: &[char], start: usize, window_end: usize) -> usize {
    let window = window_end - start;
    let floor = start + ((window as f64) * BOUNDARY_FLOOR_RATIO) as usize;

    let mut cursor = window_end;
    while cursor > floor {
        if SENTENCE_TERMINATORS.contains(&chars[cursor - 1]) {
            return cursor;
        }
        cursor -= 1;
    }

    window_end
}

fn page_for_offset(offset: usize, page_char_hint: Option<usize>) -> Option<u32> {
    let hint = page_char_hint?;
    if hint == 0 {
        return None;
    }
    u32::try_from(offset / hint + 1).ok()
}
