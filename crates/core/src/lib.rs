pub mod chunking;
pub mod citations;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod rerank;
pub mod stores;
pub mod synthesis;
pub mod traits;

pub use chunking::{chunk_document, chunk_text, estimated_tokens, overlap_seed, ChunkingConfig};
pub use citations::{append_reference_markers, build_citations, number_citations};
pub use embeddings::{
    EmbeddingGateway, EmbeddingProvider, GatewayConfig, HashEmbedder, OpenAiEmbeddingClient,
    DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{EmbeddingError, IngestError, QueryError};
pub use extractor::{extract_page_texts, LopdfExtractor, PdfExtractor};
pub use ingest::{
    build_document_fingerprint, chunk_pages, detect_section_title, digest_file,
    discover_pdf_files, ingest_folder_best_effort, ingest_pdf, into_indexed_chunks,
    IngestedDocument, IngestionOptions, IngestionReport, SkippedPdf,
};
pub use models::{
    Answer, Chunk, Citation, DeleteReport, DocumentFingerprint, DocumentState, DocumentStatus,
    IndexedChunk, PageText, QueryResponse, RetrievedResult, StoreDeleteOutcome,
};
pub use pipeline::{
    delete_document_everywhere, QueryOptions, QueryPipeline, STORE_BLOB, STORE_INDEX, STORE_STATUS,
};
pub use rerank::{Reranker, ScoreReranker};
pub use stores::{FieldKind, IndexField, IndexSchema, OpenSearchIndex};
pub use synthesis::{build_context, AnswerSynthesizer, OpenAiChatClient, SynthesizerConfig};
pub use traits::{ChatModel, ObjectStore, SearchIndex, StatusStore};
