use crate::error::QueryError;
use crate::models::{IndexedChunk, RetrievedResult};
use crate::traits::SearchIndex;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;

/// Field kinds the chunk index knows about. Rendered to the backend's
/// mapping types by the store; the in-memory chunk type never carries
/// mapping attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Keyword,
    Text,
    Integer,
    Long,
    Vector,
}

#[derive(Debug, Clone)]
pub struct IndexField {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// Explicit schema description, built once and handed to the index
/// management calls. Field names here are the single source of truth for
/// the wire payloads below.
#[derive(Debug, Clone)]
pub struct IndexSchema {
    pub fields: Vec<IndexField>,
    pub vector_dimensions: usize,
}

impl IndexSchema {
    pub fn chunk_schema(vector_dimensions: usize) -> Self {
        Self {
            fields: vec![
                IndexField { name: "document_id", kind: FieldKind::Keyword },
                IndexField { name: "document_title", kind: FieldKind::Keyword },
                IndexField { name: "content", kind: FieldKind::Text },
                IndexField { name: "section_title", kind: FieldKind::Text },
                IndexField { name: "page_number", kind: FieldKind::Integer },
                IndexField { name: "chunk_index", kind: FieldKind::Long },
                IndexField { name: "embedding", kind: FieldKind::Vector },
            ],
            vector_dimensions,
        }
    }

    pub fn to_mappings(&self) -> Value {
        let mut properties = serde_json::Map::new();
        for field in &self.fields {
            let mapping = match field.kind {
                FieldKind::Keyword => json!({"type": "keyword"}),
                FieldKind::Text => json!({"type": "text"}),
                FieldKind::Integer => json!({"type": "integer"}),
                FieldKind::Long => json!({"type": "long"}),
                FieldKind::Vector => json!({
                    "type": "knn_vector",
                    "dimension": self.vector_dimensions,
                    "method": {
                        "name": "hnsw",
                        "space_type": "cosinesimil",
                        "engine": "lucene"
                    }
                }),
            };
            properties.insert(field.name.to_string(), mapping);
        }
        json!({ "properties": Value::Object(properties) })
    }
}

/// Hybrid chunk index over an OpenSearch-compatible endpoint: one bool
/// query carries both the lexical clause and the knn clause, so the
/// backend returns a single ranked list.
pub struct OpenSearchIndex {
    client: Arc<Client>,
    endpoint: String,
    index_name: String,
    schema: IndexSchema,
}

impl OpenSearchIndex {
    pub fn new(
        endpoint: impl Into<String>,
        index_name: impl Into<String>,
        schema: IndexSchema,
    ) -> Self {
        Self {
            client: Arc::new(Client::new()),
            endpoint: endpoint.into(),
            index_name: index_name.into(),
            schema,
        }
    }

    async fn create_index(&self) -> Result<(), QueryError> {
        let response = self
            .client
            .put(format!("{}/{}", self.endpoint, self.index_name))
            .json(&json!({
                "settings": {
                    "number_of_shards": 1,
                    "number_of_replicas": 0,
                    "index.knn": true
                },
                "mappings": self.schema.to_mappings()
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QueryError::Request(format!(
                "index setup failed with {}",
                response.status()
            )));
        }

        Ok(())
    }

    async fn run_search(&self, body: Value) -> Result<Vec<RetrievedResult>, QueryError> {
        let response = self
            .client
            .post(format!("{}/{}/_search", self.endpoint, self.index_name))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QueryError::BackendResponse {
                backend: "opensearch".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut results = Vec::new();
        for hit in hits {
            let source = hit.pointer("/_source").cloned().unwrap_or(Value::Null);
            let text_field = |name: &str| {
                source
                    .get(name)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };

            let score = hit.pointer("/_score").and_then(Value::as_f64).unwrap_or(0.0);

            results.push(RetrievedResult {
                chunk_id: hit
                    .pointer("/_id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                document_id: text_field("document_id"),
                document_title: text_field("document_title"),
                content: text_field("content"),
                page_number: source
                    .get("page_number")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as u32,
                section_title: text_field("section_title"),
                score,
                relevance_score: score,
            });
        }

        Ok(results)
    }
}

/// Hybrid query body: lexical multi_match and knn as parallel `should`
/// clauses, with an optional OR filter on `document_id`. `max_results`
/// bounds both the knn k and the page size.
pub fn build_hybrid_query(
    query_text: &str,
    query_vector: &[f32],
    document_ids: &[String],
    max_results: usize,
) -> Value {
    let mut bool_query = json!({
        "should": [
            {
                "multi_match": {
                    "query": query_text,
                    "fields": ["content", "section_title"]
                }
            },
            {
                "knn": {
                    "embedding": {
                        "vector": query_vector,
                        "k": max_results
                    }
                }
            }
        ],
        "minimum_should_match": 1
    });

    if !document_ids.is_empty() {
        bool_query["filter"] = json!([{ "terms": { "document_id": document_ids } }]);
    }

    json!({
        "size": max_results,
        "query": { "bool": bool_query }
    })
}

#[async_trait]
impl SearchIndex for OpenSearchIndex {
    async fn ensure_index(&self) -> Result<(), QueryError> {
        let response = self
            .client
            .head(format!("{}/{}", self.endpoint, self.index_name))
            .send()
            .await?;

        if response.status() == StatusCode::OK {
            return Ok(());
        }

        if !response.status().is_client_error() {
            return Err(QueryError::BackendResponse {
                backend: "opensearch".to_string(),
                details: response.status().to_string(),
            });
        }

        self.create_index().await
    }

    async fn recreate_index(&self) -> Result<(), QueryError> {
        let response = self
            .client
            .delete(format!("{}/{}", self.endpoint, self.index_name))
            .send()
            .await?;

        // Deleting an absent index is fine; recreate is used for resets.
        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(QueryError::BackendResponse {
                backend: "opensearch".to_string(),
                details: response.status().to_string(),
            });
        }

        self.create_index().await
    }

    async fn upsert_chunks(&self, chunks: &[IndexedChunk]) -> Result<(), QueryError> {
        let mut operations = Vec::new();

        for chunk in chunks {
            operations.push(json!({
                "index": {
                    "_index": self.index_name,
                    "_id": chunk.id,
                }
            }));
            operations.push(json!({
                "document_id": chunk.document_id,
                "document_title": chunk.document_title,
                "content": chunk.content,
                "section_title": chunk.section_title,
                "page_number": chunk.page_number,
                "chunk_index": chunk.chunk_index,
                "embedding": chunk.embedding,
            }));
        }

        if operations.is_empty() {
            return Ok(());
        }

        let payload: String = operations
            .into_iter()
            .map(|value| serde_json::to_string(&value))
            .collect::<Result<Vec<_>, serde_json::Error>>()?
            .join("\n")
            + "\n";

        let response = self
            .client
            .post(format!("{}/_bulk", self.endpoint))
            .header("Content-Type", "application/x-ndjson")
            .body(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QueryError::BackendResponse {
                backend: "opensearch".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> Result<(), QueryError> {
        let response = self
            .client
            .post(format!(
                "{}/{}/_delete_by_query",
                self.endpoint, self.index_name
            ))
            .json(&json!({
                "query": { "term": { "document_id": document_id } }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QueryError::BackendResponse {
                backend: "opensearch".to_string(),
                details: response.status().to_string(),
            });
        }

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
        query_text: &str,
        query_vector: &[f32],
        document_ids: &[String],
        max_results: usize,
    ) -> Result<Vec<RetrievedResult>, QueryError> {
        if query_vector.len() != self.schema.vector_dimensions {
            return Err(QueryError::Request(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.schema.vector_dimensions
            )));
        }

        let body = build_hybrid_query(query_text, query_vector, document_ids, max_results);
        self.run_search(body).await
    }
}
