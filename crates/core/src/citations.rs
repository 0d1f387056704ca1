use crate::models::{Citation, RetrievedResult};

const TRUNCATION_MARKER: &str = "...";

/// One citation per result, in input order. Excerpts are cut at
/// `max_excerpt_length` characters with a trailing marker; the cut is
/// character-counted, not word-aware, and may land mid-word.
pub fn build_citations(results: &[RetrievedResult], max_excerpt_length: usize) -> Vec<Citation> {
    results
        .iter()
        .map(|result| Citation {
            document_title: result.document_title.clone(),
            page_number: result.page_number,
            excerpt: excerpt(&result.content, max_excerpt_length),
            section_title: result.section_title.clone(),
        })
        .collect()
}

fn excerpt(content: &str, max_excerpt_length: usize) -> String {
    if content.chars().count() <= max_excerpt_length {
        return content.to_string();
    }
    let mut cut: String = content.chars().take(max_excerpt_length).collect();
    cut.push_str(TRUNCATION_MARKER);
    cut
}

/// Human-readable rendering with 1-based bracket numbers in input order.
pub fn number_citations(citations: &[Citation]) -> Vec<String> {
    citations
        .iter()
        .enumerate()
        .map(|(index, citation)| {
            if citation.section_title.is_empty() {
                format!(
                    "[{}] {}, page {}: {}",
                    index + 1,
                    citation.document_title,
                    citation.page_number,
                    citation.excerpt
                )
            } else {
                format!(
                    "[{}] {}, page {} ({}): {}",
                    index + 1,
                    citation.document_title,
                    citation.page_number,
                    citation.section_title,
                    citation.excerpt
                )
            }
        })
        .collect()
}

/// Appends bracketed reference markers `[1][2]...` after the answer text.
pub fn append_reference_markers(answer_text: &str, citation_count: usize) -> String {
    if citation_count == 0 {
        return answer_text.to_string();
    }
    let markers: String = (1..=citation_count).map(|n| format!("[{n}]")).collect();
    format!("{} {}", answer_text.trim_end(), markers)
}
