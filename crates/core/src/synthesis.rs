use crate::citations::build_citations;
use crate::error::QueryError;
use crate::models::{Answer, RetrievedResult};
use crate::traits::ChatModel;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a document question-answering assistant. Answer \
using ONLY the provided context. Cite the document titles and page numbers you drew from. If \
the context does not contain enough information to answer, say so explicitly. Never fabricate \
information beyond the supplied context.";

const NO_CONTEXT_ANSWER: &str =
    "I couldn't find relevant information in the uploaded documents to answer your question.";

/// Immutable knobs for answer synthesis. Phrase lists are configuration
/// rather than module constants so tests can substitute them.
#[derive(Debug, Clone)]
pub struct SynthesizerConfig {
    pub system_prompt: String,
    pub no_context_answer: String,
    /// Lowercased phrases that signal a hedged answer.
    pub hedging_phrases: Vec<String>,
    /// Lowercased phrases that signal the answer was not found in context.
    pub not_found_phrases: Vec<String>,
    /// Answers shorter than this many words take the short-answer penalty.
    pub short_answer_words: usize,
    pub short_answer_penalty: f64,
    pub hedging_penalty: f64,
    pub max_excerpt_length: usize,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            no_context_answer: NO_CONTEXT_ANSWER.to_string(),
            hedging_phrases: [
                "i'm not sure",
                "i don't have enough information",
                "the context doesn't provide",
                "it's unclear",
                "might",
                "possibly",
                "perhaps",
            ]
            .map(str::to_string)
            .to_vec(),
            not_found_phrases: [
                "don't have enough information",
                "not in the context",
                "doesn't contain",
                "cannot find",
                "no information",
                "not provided",
                "not mentioned",
            ]
            .map(str::to_string)
            .to_vec(),
            short_answer_words: 20,
            short_answer_penalty: 0.7,
            hedging_penalty: 0.7,
            max_excerpt_length: 200,
        }
    }
}

/// Builds a grounded prompt from the selected chunks, calls the chat model
/// once, and derives a deterministic confidence score and not-found flag
/// from the output text.
pub struct AnswerSynthesizer<C: ChatModel> {
    model: C,
    config: SynthesizerConfig,
}

impl<C: ChatModel> AnswerSynthesizer<C> {
    pub fn new(model: C, config: SynthesizerConfig) -> Self {
        Self { model, config }
    }

    pub async fn generate_answer(
        &self,
        question: &str,
        chunks: &[RetrievedResult],
    ) -> Result<Answer, QueryError> {
        if chunks.is_empty() {
            // No-context short circuit: terminal, no model call.
            return Ok(Answer {
                text: self.config.no_context_answer.clone(),
                confidence_score: 0.0,
                citations: Vec::new(),
                alternatives: Vec::new(),
                found_in_documents: false,
            });
        }

        let context = build_context(chunks);
        let user_message = format!("Context:\n{context}\n\nQuestion: {question}");

        let text = self
            .model
            .complete(&self.config.system_prompt, &user_message)
            .await?;

        let confidence_score = self.confidence(chunks, &text);
        let found_in_documents = self.found_in_documents(&text);
        let citations = build_citations(chunks, self.config.max_excerpt_length);

        Ok(Answer {
            text,
            confidence_score,
            citations,
            alternatives: Vec::new(),
            found_in_documents,
        })
    }

    /// Three independent penalty signals multiplied together, rounded to
    /// two decimals. The retrieval mean is capped at 1.0 but has no floor:
    /// an index that hands back negative scores passes straight through.
    fn confidence(&self, chunks: &[RetrievedResult], answer_text: &str) -> f64 {
        let retrieval = chunks
            .iter()
            .map(|chunk| chunk.relevance_score)
            .sum::<f64>()
            / chunks.len() as f64;
        let retrieval = retrieval.min(1.0);

        let word_count = answer_text.split_whitespace().count();
        let length = if word_count < self.config.short_answer_words {
            self.config.short_answer_penalty
        } else {
            1.0
        };

        let lowered = answer_text.to_lowercase();
        let hedging = if self
            .config
            .hedging_phrases
            .iter()
            .any(|phrase| lowered.contains(phrase.as_str()))
        {
            self.config.hedging_penalty
        } else {
            1.0
        };

        round2(retrieval * length * hedging)
    }

    /// Decoupled from the numeric confidence on purpose: a low-confidence
    /// answer can still be flagged found, and the reverse.
    fn found_in_documents(&self, answer_text: &str) -> bool {
        let lowered = answer_text.to_lowercase();
        !self
            .config
            .not_found_phrases
            .iter()
            .any(|phrase| lowered.contains(phrase.as_str()))
    }
}

/// Context blocks in input order: `[Document: {title}, Page {page}]` header
/// over the chunk content, blocks separated by a `---` divider.
pub fn build_context(chunks: &[RetrievedResult]) -> String {
    chunks
        .iter()
        .map(|chunk| {
            format!(
                "[Document: {}, Page {}]\n{}",
                chunk.document_title, chunk.page_number, chunk.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Chat-completion client for an OpenAI-compatible endpoint. The request
/// timeout is deliberately generous so long grounded completions are not
/// cut off mid-answer.
pub struct OpenAiChatClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiChatClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, QueryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 1_500,
            temperature: 0.3,
        })
    }
}

#[async_trait::async_trait]
impl ChatModel for OpenAiChatClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, QueryError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": system },
                    { "role": "user", "content": user },
                ],
                "max_tokens": self.max_tokens,
                "temperature": self.temperature,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QueryError::Synthesis(format!(
                "chat endpoint returned {}",
                response.status()
            )));
        }

        let parsed: Value = response.json().await?;
        parsed
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                QueryError::Synthesis("response missing choices[0].message.content".to_string())
            })
    }
}
