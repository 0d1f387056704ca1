use thiserror::Error;

/// Failures from the embedding provider or the batching gateway around it.
/// Any single-item failure fails the whole batch call.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider response invalid: {0}")]
    InvalidResponse(String),

    #[error("embedding task failed: {0}")]
    Join(String),
}

/// Errors raised while turning a PDF into indexed chunks. Each provider
/// failure carries the stage it happened in so the orchestration layer can
/// record it and decide retry vs. permanent failure.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("multimodal OCR failed: {0}")]
    OcrFailed(String),

    #[error("embedding provider failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("index write failed: {0}")]
    IndexWrite(String),
}

/// Errors raised on the query path. Empty retrieval is never an error; it
/// is an empty result set handled by the synthesizer's no-context state.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("search request failed: {0}")]
    Request(String),

    #[error("embedding provider failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("answer synthesis failed: {0}")]
    Synthesis(String),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
