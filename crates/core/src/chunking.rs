use crate::error::IngestError;
use crate::models::{Chunk, PageText};
use regex::Regex;

/// Token-budget parameters for the chunker. Sizes are in estimated tokens,
/// overlap is in words (see `overlap_seed`).
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            overlap: 50,
        }
    }
}

impl ChunkingConfig {
    /// Validates the invariants the packing loop assumes. Called at
    /// construction so a bad configuration fails before any text is split.
    pub fn validated(chunk_size: usize, overlap: usize) -> Result<Self, IngestError> {
        if chunk_size == 0 || overlap == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_size and overlap must be positive".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {overlap} must be smaller than chunk_size {chunk_size}"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }
}

/// Fixed 4-characters-per-token heuristic. Deliberately not a real
/// tokenizer: the imprecision is accepted to avoid a tokenizer dependency,
/// and the default chunk_size/overlap (800/50) are calibrated against it.
pub fn estimated_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Trailing `overlap` whitespace-delimited words of `text`, joined with
/// single spaces. Seeds the next chunk's buffer so retrieval context stays
/// continuous across chunk boundaries.
pub fn overlap_seed(text: &str, overlap: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let start = words.len().saturating_sub(overlap);
    words[start..].join(" ")
}

fn split_paragraphs(text: &str) -> Result<Vec<&str>, IngestError> {
    // Blank-line boundary: two or more consecutive newlines, either bare or
    // CRLF-terminated.
    let boundary = Regex::new(r"(?:\r?\n){2,}")?;
    Ok(boundary
        .split(text)
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .collect())
}

const SENTENCE_TERMINATORS: [&str; 6] = [". ", "! ", "? ", ".\n", "!\n", "?\n"];

/// Splits on the fixed terminator patterns, keeping the punctuation with
/// its sentence. A paragraph without any terminator comes back whole.
fn split_sentences(paragraph: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut rest = paragraph;

    loop {
        let cut = SENTENCE_TERMINATORS
            .iter()
            .filter_map(|terminator| rest.find(terminator))
            .min();

        match cut {
            Some(position) => {
                // Keep the terminator's punctuation, drop its whitespace.
                let (sentence, remainder) = rest.split_at(position + 1);
                let sentence = sentence.trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                rest = remainder.trim_start();
            }
            None => {
                let trailing = rest.trim();
                if !trailing.is_empty() {
                    sentences.push(trailing.to_string());
                }
                break;
            }
        }
    }

    sentences
}

/// Greedy packer shared by the paragraph and sentence granularities. The
/// buffer may start as a pure overlap seed; a seed-only buffer is never
/// closed on its own, which keeps an oversized piece from looping forever
/// on the overflow path.
struct ChunkBuilder<'a> {
    config: ChunkingConfig,
    page_number: u32,
    section_title: &'a str,
    chunks: Vec<Chunk>,
    buffer: String,
    buffer_tokens: usize,
    seed_only: bool,
}

impl<'a> ChunkBuilder<'a> {
    fn new(config: ChunkingConfig, page_number: u32, section_title: &'a str) -> Self {
        Self {
            config,
            page_number,
            section_title,
            chunks: Vec::new(),
            buffer: String::new(),
            buffer_tokens: 0,
            seed_only: true,
        }
    }

    fn has_content(&self) -> bool {
        !self.buffer.is_empty() && !self.seed_only
    }

    fn push(&mut self, piece: &str, separator: &str) {
        let piece_tokens = estimated_tokens(piece);

        if self.has_content() && self.buffer_tokens + piece_tokens > self.config.chunk_size {
            self.close_and_seed();
        }

        if self.buffer.is_empty() {
            self.buffer.push_str(piece);
        } else {
            let separator = if self.seed_only { " " } else { separator };
            self.buffer.push_str(separator);
            self.buffer.push_str(piece);
        }
        self.buffer_tokens += piece_tokens;
        self.seed_only = false;
    }

    fn close_and_seed(&mut self) {
        let content = self.buffer.trim().to_string();
        let seed = overlap_seed(&content, self.config.overlap);
        self.emit(content);
        self.buffer = seed;
        self.buffer_tokens = estimated_tokens(&self.buffer);
        self.seed_only = true;
    }

    fn emit(&mut self, content: String) {
        if content.is_empty() {
            return;
        }
        self.chunks.push(Chunk {
            content,
            page_number: self.page_number,
            section_title: self.section_title.to_string(),
            chunk_index: self.chunks.len(),
        });
    }

    /// Flushes real buffered content without seeding a successor. Used
    /// before descending into sentence granularity and at end of input.
    fn flush(&mut self) {
        if self.has_content() {
            let content = self.buffer.trim().to_string();
            self.emit(content);
        }
        self.buffer.clear();
        self.buffer_tokens = 0;
        self.seed_only = true;
    }

    fn finish(mut self) -> Vec<Chunk> {
        self.flush();
        self.chunks
    }
}

/// Splits one page's text into overlapping, structure-respecting chunks
/// sized by the estimated-token budget. Empty or whitespace-only input
/// yields an empty sequence. A single paragraph with no sentence
/// terminators that exceeds the budget is emitted as one oversized chunk
/// rather than hard-truncated.
pub fn chunk_text(
    text: &str,
    page_number: u32,
    section_title: &str,
    config: &ChunkingConfig,
) -> Result<Vec<Chunk>, IngestError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut builder = ChunkBuilder::new(*config, page_number, section_title);

    for paragraph in split_paragraphs(text)? {
        if estimated_tokens(paragraph) > config.chunk_size {
            builder.flush();
            for sentence in split_sentences(paragraph) {
                builder.push(&sentence, " ");
            }
        } else {
            builder.push(paragraph, "\n\n");
        }
    }

    Ok(builder.finish())
}

/// Document-level chunking: each page is chunked independently (no overlap
/// seed crosses a page boundary), then the per-page sequences are
/// concatenated and re-indexed so `chunk_index` runs 0..n over the whole
/// document.
pub fn chunk_document(
    pages: &[PageText],
    section_titles: &[String],
    config: &ChunkingConfig,
) -> Result<Vec<Chunk>, IngestError> {
    let mut all = Vec::new();

    for (position, page) in pages.iter().enumerate() {
        let section_title = section_titles
            .get(position)
            .map(String::as_str)
            .unwrap_or("");
        let page_chunks = chunk_text(&page.text, page.page_number, section_title, config)?;
        all.extend(page_chunks);
    }

    for (index, chunk) in all.iter_mut().enumerate() {
        chunk.chunk_index = index;
    }

    Ok(all)
}
