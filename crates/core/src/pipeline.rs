use crate::embeddings::EmbeddingGateway;
use crate::error::QueryError;
use crate::models::{DeleteReport, QueryResponse};
use crate::rerank::Reranker;
use crate::synthesis::AnswerSynthesizer;
use crate::traits::{ChatModel, ObjectStore, SearchIndex, StatusStore};
use std::time::Instant;
use tracing::{debug, info};

pub const STORE_BLOB: &str = "blob";
pub const STORE_INDEX: &str = "index";
pub const STORE_STATUS: &str = "status";

#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Chunks handed to the synthesizer after re-ranking.
    pub max_chunks: usize,
    /// Restrict retrieval to these documents; empty means all.
    pub document_ids: Vec<String>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            max_chunks: 5,
            document_ids: Vec::new(),
        }
    }
}

/// Read path: embed the question, run one hybrid query, re-rank, and
/// synthesize a grounded answer with citations. Stateless per call; the
/// index is the only system of record.
pub struct QueryPipeline<S, C, R>
where
    S: SearchIndex,
    C: ChatModel,
    R: Reranker,
{
    index: S,
    gateway: EmbeddingGateway,
    synthesizer: AnswerSynthesizer<C>,
    reranker: R,
}

impl<S, C, R> QueryPipeline<S, C, R>
where
    S: SearchIndex + Send + Sync,
    C: ChatModel,
    R: Reranker + Send + Sync,
{
    pub fn new(
        index: S,
        gateway: EmbeddingGateway,
        synthesizer: AnswerSynthesizer<C>,
        reranker: R,
    ) -> Self {
        Self {
            index,
            gateway,
            synthesizer,
            reranker,
        }
    }

    pub async fn answer(
        &self,
        question: &str,
        options: &QueryOptions,
    ) -> Result<QueryResponse, QueryError> {
        if question.trim().is_empty() {
            return Err(QueryError::Request("question is empty".to_string()));
        }

        let started = Instant::now();
        let query_vector = self.gateway.embed(question).await?;

        // Over-fetch so the re-ranker has real candidates to cut down.
        let breadth = options.max_chunks.max(1).saturating_mul(3);
        let retrieved = if options.document_ids.is_empty() {
            self.index
                .hybrid_search(question, &query_vector, breadth)
                .await?
        } else {
            self.index
                .hybrid_search_filtered(question, &query_vector, &options.document_ids, breadth)
                .await?
        };

        debug!(candidates = retrieved.len(), "hybrid retrieval complete");

        let selected = self.reranker.select_top_k(retrieved, options.max_chunks);
        let answer = self.synthesizer.generate_answer(question, &selected).await?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            elapsed_ms,
            confidence = answer.confidence_score,
            found = answer.found_in_documents,
            "query answered"
        );

        Ok(QueryResponse { answer, elapsed_ms })
    }
}

/// Best-effort delete of one document across all three stores. Each store
/// is attempted regardless of earlier failures and its outcome recorded;
/// the report says exactly which stores succeeded.
pub async fn delete_document_everywhere(
    document_id: &str,
    blob_key: &str,
    blob: &impl ObjectStore,
    index: &impl SearchIndex,
    status: &impl StatusStore,
) -> DeleteReport {
    let mut report = DeleteReport::default();

    report.record(
        STORE_BLOB,
        blob.delete(blob_key).await.map_err(|e| e.to_string()),
    );
    report.record(
        STORE_INDEX,
        index
            .delete_document(document_id)
            .await
            .map_err(|e| e.to_string()),
    );
    report.record(
        STORE_STATUS,
        status
            .delete(document_id)
            .await
            .map_err(|e| e.to_string()),
    );

    info!(document_id, summary = %report.summary(), "document delete fan-out");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{GatewayConfig, HashEmbedder};
    use crate::models::{DocumentStatus, IndexedChunk, RetrievedResult};
    use crate::rerank::ScoreReranker;
    use crate::synthesis::SynthesizerConfig;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct StubIndex {
        corpus: Vec<RetrievedResult>,
    }

    #[async_trait]
    impl SearchIndex for StubIndex {
        async fn ensure_index(&self) -> Result<(), QueryError> {
            Ok(())
        }

        async fn recreate_index(&self) -> Result<(), QueryError> {
            Ok(())
        }

        async fn upsert_chunks(&self, _chunks: &[IndexedChunk]) -> Result<(), QueryError> {
            Ok(())
        }

        async fn delete_document(&self, _document_id: &str) -> Result<(), QueryError> {
            Ok(())
        }

        async fn hybrid_search(
            &self,
            query_text: &str,
            query_vector: &[f32],
            max_results: usize,
        ) -> Result<Vec<RetrievedResult>, QueryError> {
            self.hybrid_search_filtered(query_text, query_vector, &[], max_results)
                .await
        }

        async fn hybrid_search_filtered(
            &self,
            _query_text: &str,
            _query_vector: &[f32],
            document_ids: &[String],
            max_results: usize,
        ) -> Result<Vec<RetrievedResult>, QueryError> {
            let mut hits: Vec<RetrievedResult> = self
                .corpus
                .iter()
                .filter(|hit| {
                    document_ids.is_empty() || document_ids.contains(&hit.document_id)
                })
                .cloned()
                .collect();
            hits.truncate(max_results);
            Ok(hits)
        }
    }

    struct FakeChat;

    #[async_trait]
    impl ChatModel for FakeChat {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, QueryError> {
            Ok("The manual states the pump runs at forty bar and is serviced twice a year \
by a trained technician following the standard procedure described there."
                .to_string())
        }
    }

    fn hit(chunk_id: &str, document_id: &str, score: f64) -> RetrievedResult {
        RetrievedResult {
            chunk_id: chunk_id.to_string(),
            document_id: document_id.to_string(),
            document_title: format!("{document_id}.pdf"),
            content: "Pump runs at forty bar.".to_string(),
            page_number: 1,
            section_title: String::new(),
            score,
            relevance_score: score,
        }
    }

    fn pipeline(corpus: Vec<RetrievedResult>) -> QueryPipeline<StubIndex, FakeChat, ScoreReranker> {
        QueryPipeline::new(
            StubIndex { corpus },
            EmbeddingGateway::new(
                Arc::new(HashEmbedder { dimensions: 8 }),
                GatewayConfig::default(),
            ),
            AnswerSynthesizer::new(FakeChat, SynthesizerConfig::default()),
            ScoreReranker,
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn filtered_query_only_sees_requested_documents() {
        let pipeline = pipeline(vec![
            hit("c1", "doc-a", 0.9),
            hit("c2", "doc-b", 0.8),
            hit("c3", "doc-c", 0.7),
        ]);

        let options = QueryOptions {
            max_chunks: 5,
            document_ids: vec!["doc-a".to_string(), "doc-b".to_string()],
        };
        let response = pipeline.answer("pump pressure", &options).await.unwrap();

        let cited_docs: Vec<&str> = response
            .answer
            .citations
            .iter()
            .map(|c| c.document_title.as_str())
            .collect();
        assert_eq!(cited_docs, vec!["doc-a.pdf", "doc-b.pdf"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_retrieval_yields_no_context_answer() {
        let pipeline = pipeline(Vec::new());
        let response = pipeline
            .answer("anything", &QueryOptions::default())
            .await
            .unwrap();

        assert_eq!(response.answer.confidence_score, 0.0);
        assert!(!response.answer.found_in_documents);
        assert!(response.answer.citations.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_question_is_rejected() {
        let pipeline = pipeline(Vec::new());
        assert!(pipeline
            .answer("   ", &QueryOptions::default())
            .await
            .is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reranker_caps_context_at_max_chunks() {
        let pipeline = pipeline(vec![
            hit("c1", "doc-a", 0.1),
            hit("c2", "doc-a", 0.9),
            hit("c3", "doc-a", 0.5),
        ]);

        let options = QueryOptions {
            max_chunks: 2,
            document_ids: Vec::new(),
        };
        let response = pipeline.answer("pump", &options).await.unwrap();
        assert_eq!(response.answer.citations.len(), 2);
    }

    struct OkBlob;
    struct OkStatus;
    struct FailingIndex;

    #[async_trait]
    impl ObjectStore for OkBlob {
        async fn put(&self, _key: &str, _bytes: &[u8]) -> Result<(), QueryError> {
            Ok(())
        }

        async fn delete(&self, _key: &str) -> Result<(), QueryError> {
            Ok(())
        }

        async fn ensure_container(&self) -> Result<(), QueryError> {
            Ok(())
        }
    }

    #[async_trait]
    impl StatusStore for OkStatus {
        async fn upsert(&self, _status: &DocumentStatus) -> Result<(), QueryError> {
            Ok(())
        }

        async fn get(&self, _document_id: &str) -> Result<Option<DocumentStatus>, QueryError> {
            Ok(None)
        }

        async fn delete(&self, _document_id: &str) -> Result<(), QueryError> {
            Ok(())
        }
    }

    #[async_trait]
    impl SearchIndex for FailingIndex {
        async fn ensure_index(&self) -> Result<(), QueryError> {
            Ok(())
        }

        async fn recreate_index(&self) -> Result<(), QueryError> {
            Ok(())
        }

        async fn upsert_chunks(&self, _chunks: &[IndexedChunk]) -> Result<(), QueryError> {
            Ok(())
        }

        async fn delete_document(&self, _document_id: &str) -> Result<(), QueryError> {
            Err(QueryError::Request("index unavailable".to_string()))
        }

        async fn hybrid_search(
            &self,
            _query_text: &str,
            _query_vector: &[f32],
            _max_results: usize,
        ) -> Result<Vec<RetrievedResult>, QueryError> {
            Ok(Vec::new())
        }

        async fn hybrid_search_filtered(
            &self,
            _query_text: &str,
            _query_vector: &[f32],
            _document_ids: &[String],
            _max_results: usize,
        ) -> Result<Vec<RetrievedResult>, QueryError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_reports_partial_failure_per_store() {
        let report =
            delete_document_everywhere("doc-1", "blobs/doc-1.pdf", &OkBlob, &FailingIndex, &OkStatus)
                .await;

        assert!(report.deleted_blob());
        assert!(!report.deleted_chunks());
        assert!(report.deleted_status());
        assert!(!report.overall_success());

        let errors = report.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains(STORE_INDEX));
        assert!(report.summary().contains("partially deleted"));
    }
}
