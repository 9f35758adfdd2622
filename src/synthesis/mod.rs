
pub mod ollama;

pub use ollama::OllamaGenerator;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::Result;
use crate::retrieval::SearchResult;

/// Fixed answer when retrieval produced nothing relevant.
pub const NO_INFORMATION_ANSWER: &str =
    "죄송합니다. 질문과 관련된 정보를 찾을 수 없습니다. 다른 질문을 시도해보시거나 관리자에게 문의해주세요.";

/// Confidence attached to extractive answers: unverified source text, not
/// a generated synthesis.
pub const EXTRACTIVE_CONFIDENCE: f32 = 0.3;

/// Model label reported when the answer did not come from the generative
/// backend.
const FALLBACK_MODEL: &str = "fallback";

/// How many ranked results go into the generation context.
const MAX_CONTEXT_SOURCES: usize = 5;

/// Per-source character budget inside the generation context.
const MAX_SOURCE_CHARS: usize = 1200;

/// Sentences shorter than this are noise, not answer material.
const MIN_SENTENCE_CHARS: usize = 10;

/// Sentences taken from the top chunk for an extractive answer.
const EXTRACTIVE_SENTENCES: usize = 3;

const HEDGING_PHRASES: [&str; 4] = ["모르겠습니다", "확실하지 않습니다", "추측", "아마도"];

/// A text-generation backend: a lightweight health probe plus a prompt
/// completion call. Both are expected to enforce their own timeouts.
pub trait GenerativeBackend: Send + Sync {
    fn model_name(&self) -> &str;

    /// Cheap reachability probe run before every generation call.
    fn health_check(&self) -> bool;

    fn generate(&self, prompt: &str) -> Result<String>;
}

/// Outcome of answer synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    pub answer: String,
    pub confidence: f32,
    pub model: String,
    /// Whether the generative backend produced the answer (as opposed to
    /// the extractive fallback).
    pub generative: bool,
}

/// Turns ranked retrieval results and a query into a final answer.
///
/// With a healthy generative backend the answer is synthesized from a
/// fixed Korean instruction template over the retrieved context. When the
/// backend is missing, unreachable, times out, or returns a degenerate
/// reply, the synthesizer degrades to an extractive answer built from the
/// highest-similarity chunk. It never raises to the caller.
pub struct AnswerSynthesizer {
    backend: Option<Arc<dyn GenerativeBackend>>,
}

impl AnswerSynthesizer {
    #[inline]
    pub fn new(backend: Option<Arc<dyn GenerativeBackend>>) -> Self {
        Self { backend }
    }

    #[inline]
    pub fn synthesize(&self, query: &str, results: &[SearchResult]) -> Synthesis {
        if results.is_empty() {
            return Synthesis {
                answer: NO_INFORMATION_ANSWER.to_string(),
                confidence: 0.0,
                model: FALLBACK_MODEL.to_string(),
                generative: false,
            };
        }

        let top_similarity = results[0].similarity;

        if let Some(backend) = &self.backend {
            if backend.health_check() {
                let prompt = build_prompt(query, results);
                match backend.generate(&prompt) {
                    Ok(answer) if !is_degenerate(&answer) => {
                        debug!("generative answer accepted ({} chars)", answer.len());
                        return Synthesis {
                            answer,
                            confidence: confidence_band(top_similarity),
                            model: backend.model_name().to_string(),
                            generative: true,
                        };
                    }
                    Ok(answer) => {
                        warn!(
                            "generative answer rejected as degenerate ({} chars), falling back",
                            answer.trim().len()
                        );
                    }
                    Err(e) => {
                        warn!("generation failed, falling back to extractive answer: {}", e);
                    }
                }
            } else {
                warn!("generative backend failed health probe, using extractive answer");
            }
        }

        Synthesis {
            answer: extractive_answer(results),
            confidence: EXTRACTIVE_CONFIDENCE,
            model: FALLBACK_MODEL.to_string(),
            generative: false,
        }
    }
}

/// Discretize top similarity into the user-facing confidence bands. The
/// coarseness is intentional; this is a trust signal, not a calibrated
/// probability.
#[inline]
pub fn confidence_band(top_similarity: f32) -> f32 {
    if top_similarity >= 0.9 {
        0.95
    } else if top_similarity >= 0.8 {
        0.85
    } else if top_similarity >= 0.7 {
        0.75
    } else if top_similarity >= 0.6 {
        0.65
    } else {
        0.3
    }
}

/// Render the fixed Korean instruction template over the labeled context.
fn build_prompt(query: &str, results: &[SearchResult]) -> String {
    let context = build_context(results);

    format!(
        "당신은 업로드된 문서의 내용을 바탕으로 질문에 답변하는 전문 어시스턴트입니다.\n\n\
         중요: 반드시 한국어로만 답변하세요.\n\n\
         주어진 문서 내용만을 바탕으로 정확하게 답변하고, 문서에 없는 내용은 솔직하게 모른다고 말하세요.\n\n\
         답변 형식 (반드시 이 형식을 따라주세요):\n\
         **핵심 답변**\n\
         [질문에 대한 핵심 답변]\n\n\
         **상세 설명**\n\
         [구체적인 설명]\n\n\
         **주의사항**\n\
         [관련 주의사항이나 답변의 한계]\n\n\
         문서 내용:\n{}\n\n\
         사용자 질문: {}",
        context, query
    )
}

/// Concatenate the top results, each labeled with a source index.
fn build_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .take(MAX_CONTEXT_SOURCES)
        .enumerate()
        .map(|(i, result)| {
            let content: String = result.content.chars().take(MAX_SOURCE_CHARS).collect();
            format!("[출처 {}] {}\n{}", i + 1, result.document_title, content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// A reply that is too short, echoes an internal error, or hedges more
/// than it answers is not worth showing over the extractive fallback.
fn is_degenerate(answer: &str) -> bool {
    let trimmed = answer.trim();
    if trimmed.chars().count() < 20 {
        return true;
    }
    if trimmed.contains("죄송합니다") && trimmed.contains("오류") {
        return true;
    }
    let hedges = HEDGING_PHRASES
        .iter()
        .filter(|phrase| trimmed.contains(*phrase))
        .count();
    hedges >= 2
}

/// Extractive fallback: the first few clean sentences of the single
/// highest-similarity chunk, preferring Korean sentences when the content
/// mixes languages.
fn extractive_answer(results: &[SearchResult]) -> String {
    let top = &results[0];
    let normalized = normalize_whitespace(&top.content);

    let sentences: Vec<&str> = normalized
        .split(['.', '!', '?', '。', '！', '？'])
        .map(str::trim)
        .filter(|s| s.chars().count() > MIN_SENTENCE_CHARS)
        .collect();

    let korean: Vec<&str> = sentences
        .iter()
        .copied()
        .filter(|s| contains_hangul(s))
        .collect();

    let chosen = if korean.is_empty() { &sentences } else { &korean };

    if chosen.is_empty() {
        return normalized.chars().take(500).collect();
    }

    let mut answer = chosen
        .iter()
        .take(EXTRACTIVE_SENTENCES)
        .copied()
        .collect::<Vec<_>>()
        .join(". ");
    answer.push('.');
    answer
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn contains_hangul(text: &str) -> bool {
    text.chars()
        .any(|c| matches!(c, '\u{AC00}'..='\u{D7A3}' | '\u{1100}'..='\u{11FF}' | '\u{3130}'..='\u{318F}'))
}
