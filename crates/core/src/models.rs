use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page of extracted document text, as returned by the extraction layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    /// 1-based page number.
    pub page_number: u32,
    /// Raw extracted text, possibly empty for image-only pages.
    pub text: String,
}

/// A contiguous, possibly-overlapping slice of page text prepared for
/// embedding and retrieval. `content` is trimmed and never empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub content: String,
    pub page_number: u32,
    /// Empty string when the section is unknown.
    pub section_title: String,
    /// 0-based, strictly monotonic within one chunking call.
    pub chunk_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFingerprint {
    pub document_id: String,
    pub document_title: String,
    pub source_path: String,
    pub checksum: String,
    pub ingested_at: DateTime<Utc>,
}

/// A chunk augmented with identity and its embedding, ready for the index.
/// Created once at ingestion time and deleted only by `document_id` cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub id: String,
    pub document_id: String,
    pub document_title: String,
    pub content: String,
    pub page_number: u32,
    pub section_title: String,
    pub chunk_index: usize,
    pub embedding: Vec<f32>,
}

/// Normalized output of the retrieval engine, in index relevance order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedResult {
    pub chunk_id: String,
    pub document_id: String,
    pub document_title: String,
    pub content: String,
    pub page_number: u32,
    pub section_title: String,
    /// Unbounded relevance score from the hybrid index. Higher is better;
    /// not assumed to lie in [0,1].
    pub score: f64,
    /// Currently always equal to `score`. Kept as a separate field so a
    /// future re-ranker can diverge semantic similarity from hybrid rank.
    pub relevance_score: f64,
}

/// A user-facing pointer back to the source chunk backing part of an answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub document_title: String,
    pub page_number: u32,
    pub excerpt: String,
    pub section_title: String,
}

/// Output of the answer synthesizer for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    /// Heuristic, nominally in [0,1] but not hard-clamped; see the
    /// synthesizer for the derivation.
    pub confidence_score: f64,
    /// Ordered to match the chunk order used to build the answer context.
    pub citations: Vec<Citation>,
    /// Reserved for multi-answer support; always empty today.
    pub alternatives: Vec<String>,
    pub found_in_documents: bool,
}

/// Lifecycle state of an uploaded document, as mirrored into the status
/// store by the orchestration layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DocumentState {
    Uploaded,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStatus {
    pub document_id: String,
    pub title: String,
    pub state: DocumentState,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error_message: Option<String>,
    pub failed_stage: Option<String>,
    pub attempts: u32,
}

impl DocumentStatus {
    pub fn new(document_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            document_id: document_id.into(),
            title: title.into(),
            state: DocumentState::Uploaded,
            uploaded_at: now,
            updated_at: now,
            error_message: None,
            failed_stage: None,
            attempts: 0,
        }
    }

    pub fn mark_failed(&mut self, stage: impl Into<String>, message: impl Into<String>) {
        self.state = DocumentState::Failed;
        self.error_message = Some(message.into());
        self.failed_stage = Some(stage.into());
        self.attempts = self.attempts.saturating_add(1);
        self.updated_at = Utc::now();
    }
}

/// Outcome of one store in the best-effort document delete fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreDeleteOutcome {
    pub store: String,
    pub succeeded: bool,
    pub error: Option<String>,
}

/// Per-store result of deleting one document across the object store, the
/// search index, and the status store. Partial failure is a value here,
/// never an error that hides which stores succeeded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteReport {
    pub outcomes: Vec<StoreDeleteOutcome>,
}

impl DeleteReport {
    pub fn record(&mut self, store: &str, result: Result<(), String>) {
        match result {
            Ok(()) => self.outcomes.push(StoreDeleteOutcome {
                store: store.to_string(),
                succeeded: true,
                error: None,
            }),
            Err(error) => self.outcomes.push(StoreDeleteOutcome {
                store: store.to_string(),
                succeeded: false,
                error: Some(error),
            }),
        }
    }

    fn store_succeeded(&self, store: &str) -> bool {
        self.outcomes
            .iter()
            .any(|outcome| outcome.store == store && outcome.succeeded)
    }

    pub fn deleted_blob(&self) -> bool {
        self.store_succeeded(crate::pipeline::STORE_BLOB)
    }

    pub fn deleted_chunks(&self) -> bool {
        self.store_succeeded(crate::pipeline::STORE_INDEX)
    }

    pub fn deleted_status(&self) -> bool {
        self.store_succeeded(crate::pipeline::STORE_STATUS)
    }

    pub fn overall_success(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|outcome| outcome.succeeded)
    }

    pub fn errors(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter_map(|outcome| {
                outcome
                    .error
                    .as_ref()
                    .map(|error| format!("{}: {}", outcome.store, error))
            })
            .collect()
    }

    pub fn summary(&self) -> String {
        let parts = self
            .outcomes
            .iter()
            .map(|outcome| {
                if outcome.succeeded {
                    format!("{}=deleted", outcome.store)
                } else {
                    format!("{}=failed", outcome.store)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");

        if self.overall_success() {
            format!("document fully deleted ({parts})")
        } else {
            format!("document partially deleted ({parts})")
        }
    }
}

/// Final response of one query pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: Answer,
    pub elapsed_ms: u64,
}
