use crate::error::QueryError;
use crate::models::{DocumentStatus, IndexedChunk, RetrievedResult};
use async_trait::async_trait;

/// Seam for the external hybrid search index. One request combines lexical
/// matching over chunk content with k-nearest-neighbor matching over the
/// embedding field; the index returns a single ranked list.
#[async_trait]
pub trait SearchIndex {
    /// Create the index if it does not exist yet.
    async fn ensure_index(&self) -> Result<(), QueryError>;

    /// Drop and recreate the index with its current schema. Destructive.
    async fn recreate_index(&self) -> Result<(), QueryError>;

    /// Bulk upsert; re-running for the same document produces equivalent,
    /// replaceable chunks.
    async fn upsert_chunks(&self, chunks: &[IndexedChunk]) -> Result<(), QueryError>;

    /// Cascading delete of every chunk owned by `document_id`.
    async fn delete_document(&self, document_id: &str) -> Result<(), QueryError>;

    /// Hybrid query over all documents. `max_results` bounds both the knn
    /// candidate count and the result page size. Empty results are a valid
    /// outcome, not an error.
    async fn hybrid_search(
        &self,
        query_text: &str,
        query_vector: &[f32],
        max_results: usize,
    ) -> Result<Vec<RetrievedResult>, QueryError>;

    /// Hybrid query restricted to chunks whose `document_id` equals any
    /// element of `document_ids` (OR semantics). An empty slice means
    /// unfiltered.
    async fn hybrid_search_filtered(
        &self,
        query_text: &str,
        query_vector: &[f32],
        document_ids: &[String],
        max_results: usize,
    ) -> Result<Vec<RetrievedResult>, QueryError>;
}

/// Seam for the chat-completion model used by the answer synthesizer.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, QueryError>;
}

/// Seam for the raw-bytes object store. Delete of a missing object is not
/// an error.
#[async_trait]
pub trait ObjectStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), QueryError>;
    async fn delete(&self, key: &str) -> Result<(), QueryError>;
    async fn ensure_container(&self) -> Result<(), QueryError>;
}

/// Seam for the document lifecycle record store.
#[async_trait]
pub trait StatusStore {
    async fn upsert(&self, status: &DocumentStatus) -> Result<(), QueryError>;
    async fn get(&self, document_id: &str) -> Result<Option<DocumentStatus>, QueryError>;
    async fn delete(&self, document_id: &str) -> Result<(), QueryError>;
}
