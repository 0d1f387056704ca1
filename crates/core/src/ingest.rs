use crate::chunking::{chunk_document, ChunkingConfig};
use crate::embeddings::EmbeddingGateway;
use crate::error::IngestError;
use crate::extractor::extract_page_texts;
use crate::models::{Chunk, DocumentFingerprint, IndexedChunk, PageText};
use crate::traits::SearchIndex;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy)]
pub struct IngestionOptions {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            overlap: 50,
        }
    }
}

impl IngestionOptions {
    pub fn chunking_config(&self) -> Result<ChunkingConfig, IngestError> {
        ChunkingConfig::validated(self.chunk_size, self.overlap)
    }
}

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn build_document_fingerprint(path: &Path) -> Result<DocumentFingerprint, IngestError> {
    let checksum = digest_file(path)?;
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            IngestError::MissingFileName(format!("path missing filename: {}", path.display()))
        })?;

    Ok(DocumentFingerprint {
        document_id: generate_document_id(path),
        document_title: name.to_string(),
        source_path: path.to_string_lossy().to_string(),
        checksum,
        ingested_at: Utc::now(),
    })
}

fn generate_document_id(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// First plausible heading line of a page: non-empty, not purely numeric,
/// at least three alphabetic characters, truncated to 120 chars. Empty
/// string when no line qualifies.
pub fn detect_section_title(page_text: &str) -> String {
    for line in page_text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if trimmed.chars().filter(|c| c.is_alphabetic()).count() < 3 {
            continue;
        }
        return trimmed.chars().take(120).collect();
    }
    String::new()
}

/// Chunks every page of an already-extracted document. Overlap never
/// crosses a page boundary; `chunk_index` runs 0..n over the whole
/// document.
pub fn chunk_pages(pages: &[PageText], options: &IngestionOptions) -> Result<Vec<Chunk>, IngestError> {
    let config = options.chunking_config()?;
    let section_titles: Vec<String> = pages
        .iter()
        .map(|page| detect_section_title(&page.text))
        .collect();
    chunk_document(pages, &section_titles, &config)
}

/// Pairs chunks with their embeddings positionally into index-ready
/// records. Ids are generated here, once, and stay stable for the chunk's
/// lifetime.
pub fn into_indexed_chunks(
    fingerprint: &DocumentFingerprint,
    chunks: Vec<Chunk>,
    embeddings: Vec<Vec<f32>>,
) -> Result<Vec<IndexedChunk>, IngestError> {
    if chunks.len() != embeddings.len() {
        return Err(IngestError::InvalidArgument(format!(
            "embedding count {} does not match chunk count {}",
            embeddings.len(),
            chunks.len()
        )));
    }

    Ok(chunks
        .into_iter()
        .zip(embeddings)
        .map(|(chunk, embedding)| IndexedChunk {
            id: Uuid::new_v4().to_string(),
            document_id: fingerprint.document_id.clone(),
            document_title: fingerprint.document_title.clone(),
            content: chunk.content,
            page_number: chunk.page_number,
            section_title: chunk.section_title,
            chunk_index: chunk.chunk_index,
            embedding,
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct IngestedDocument {
    pub fingerprint: DocumentFingerprint,
    pub chunk_count: usize,
}

/// Full write path for one PDF: extract, chunk, embed, upsert. Re-running
/// for the same path produces equivalent chunks keyed by the same
/// `document_id`, so a retry simply replaces the previous attempt.
pub async fn ingest_pdf(
    path: &Path,
    options: &IngestionOptions,
    gateway: &EmbeddingGateway,
    index: &impl SearchIndex,
) -> Result<IngestedDocument, IngestError> {
    let fingerprint = build_document_fingerprint(path)?;
    let pages = extract_page_texts(path)?;
    let chunks = chunk_pages(&pages, options)?;

    info!(
        document = %fingerprint.document_title,
        pages = pages.len(),
        chunks = chunks.len(),
        "chunked document"
    );

    let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
    let embeddings = gateway.embed_batch(&texts).await?;
    let indexed = into_indexed_chunks(&fingerprint, chunks, embeddings)?;

    index
        .upsert_chunks(&indexed)
        .await
        .map_err(|error| IngestError::IndexWrite(error.to_string()))?;

    Ok(IngestedDocument {
        chunk_count: indexed.len(),
        fingerprint,
    })
}

pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

pub struct IngestionReport {
    pub ingested: Vec<IngestedDocument>,
    pub skipped_files: Vec<SkippedPdf>,
}

/// Best-effort folder ingestion: unreadable files are reported, not fatal.
pub async fn ingest_folder_best_effort(
    folder: &Path,
    options: &IngestionOptions,
    gateway: &EmbeddingGateway,
    index: &impl SearchIndex,
) -> Result<IngestionReport, IngestError> {
    let files = discover_pdf_files(folder);

    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no pdf files found in {}",
            folder.display()
        )));
    }

    let mut ingested = Vec::new();
    let mut skipped_files = Vec::new();

    for path in files {
        match ingest_pdf(&path, options, gateway, index).await {
            Ok(document) => ingested.push(document),
            Err(error) => {
                warn!(path = %path.display(), reason = %error, "skipped pdf");
                skipped_files.push(SkippedPdf {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    Ok(IngestionReport {
        ingested,
        skipped_files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{GatewayConfig, HashEmbedder};
    use crate::error::QueryError;
    use crate::models::RetrievedResult;
    use async_trait::async_trait;
    use std::fs::{self, File};
    use std::io::Write;
    use std::sync::Arc;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[test]
    fn discover_pdf_files_is_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(nested.join("b.pdf"))
            .and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(base.join("notes.txt")).and_then(|mut file| file.write_all(b"text"))?;

        let files = discover_pdf_files(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn checksum_is_reproducible() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let file_path = dir.path().join("a.pdf");
        fs::write(&file_path, b"abc")?;

        let first = digest_file(&file_path)?;
        let second = digest_file(&file_path)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn section_title_skips_numeric_and_short_lines() {
        assert_eq!(detect_section_title("42\niv\n3.1 Pump Assembly\nbody"), "3.1 Pump Assembly");
        assert_eq!(detect_section_title("  \n  \n"), "");
    }

    #[test]
    fn indexed_chunks_keep_positional_pairing() {
        let fingerprint = DocumentFingerprint {
            document_id: "doc-1".to_string(),
            document_title: "Manual.pdf".to_string(),
            source_path: "/tmp/manual.pdf".to_string(),
            checksum: "checksum".to_string(),
            ingested_at: Utc::now(),
        };
        let chunks = vec![
            Chunk {
                content: "first".to_string(),
                page_number: 1,
                section_title: String::new(),
                chunk_index: 0,
            },
            Chunk {
                content: "second".to_string(),
                page_number: 1,
                section_title: String::new(),
                chunk_index: 1,
            },
        ];
        let embeddings = vec![vec![1.0], vec![2.0]];

        let indexed = into_indexed_chunks(&fingerprint, chunks, embeddings).unwrap();
        assert_eq!(indexed.len(), 2);
        assert_eq!(indexed[0].content, "first");
        assert_eq!(indexed[0].embedding, vec![1.0]);
        assert_eq!(indexed[1].content, "second");
        assert_eq!(indexed[1].embedding, vec![2.0]);
        assert_ne!(indexed[0].id, indexed[1].id);
        assert_eq!(indexed[0].document_id, "doc-1");
    }

    #[test]
    fn mismatched_embedding_count_is_rejected() {
        let fingerprint = DocumentFingerprint {
            document_id: "doc-1".to_string(),
            document_title: "Manual.pdf".to_string(),
            source_path: "/tmp/manual.pdf".to_string(),
            checksum: "checksum".to_string(),
            ingested_at: Utc::now(),
        };
        let chunks = vec![Chunk {
            content: "only".to_string(),
            page_number: 1,
            section_title: String::new(),
            chunk_index: 0,
        }];

        assert!(into_indexed_chunks(&fingerprint, chunks, Vec::new()).is_err());
    }

    #[derive(Default)]
    struct RecordingIndex {
        upserted: Mutex<Vec<IndexedChunk>>,
    }

    #[async_trait]
    impl SearchIndex for RecordingIndex {
        async fn ensure_index(&self) -> Result<(), QueryError> {
            Ok(())
        }

        async fn recreate_index(&self) -> Result<(), QueryError> {
            Ok(())
        }

        async fn upsert_chunks(&self, chunks: &[IndexedChunk]) -> Result<(), QueryError> {
            self.upserted.lock().unwrap().extend_from_slice(chunks);
            Ok(())
        }

        async fn delete_document(&self, _document_id: &str) -> Result<(), QueryError> {
            Ok(())
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
    async fn folder_ingestion_reports_unreadable_pdfs() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("unreadable.pdf"), b"%PDF-1.4\n%broken")?;

        let gateway = EmbeddingGateway::new(
            Arc::new(HashEmbedder { dimensions: 8 }),
            GatewayConfig::default(),
        );
        let index = RecordingIndex::default();

        let report = ingest_folder_best_effort(
            dir.path(),
            &IngestionOptions::default(),
            &gateway,
            &index,
        )
        .await?;

        assert!(report.ingested.is_empty());
        assert_eq!(report.skipped_files.len(), 1);
        assert!(index.upserted.lock().unwrap().is_empty());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn folder_ingestion_fails_without_pdfs() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let gateway = EmbeddingGateway::new(
            Arc::new(HashEmbedder { dimensions: 8 }),
            GatewayConfig::default(),
        );
        let index = RecordingIndex::default();

        let result = ingest_folder_best_effort(
            dir.path(),
            &IngestionOptions::default(),
            &gateway,
            &index,
        )
        .await;
        assert!(result.is_err());
        Ok(())
    }
}
