//! Text chunking along paragraph and sentence boundaries.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ChunkError;
use crate::models::{Chunk, ChunkingConfig};
use crate::utils::{CHARS_PER_TOKEN, has_meaningful_content};

static RE_PARAGRAPH_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\n+").unwrap());
static RE_SENTENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^.!?]+[.!?]+").unwrap());

/// Splits document text into token-bounded chunks.
///
/// Sizes are estimated through the fixed characters-per-token ratio, so
/// chunk boundaries are approximate by design. Overlap is a context
/// preservation target: paragraph continuity is kept, byte-exact overlap
/// is not guaranteed.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Target chunk size in characters.
    chunk_size: usize,
    /// Overlap target in characters.
    overlap: usize,
}

impl TextChunker {
    pub fn new(config: &ChunkingConfig) -> Result<Self, ChunkError> {
        if config.chunk_size == 0 {
            return Err(ChunkError::InvalidInput(
                "chunk_size must be at least 1 token".to_string(),
            ));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(ChunkError::InvalidInput(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }

        Ok(Self {
            chunk_size: config.chunk_size as usize * CHARS_PER_TOKEN,
            overlap: config.chunk_overlap as usize * CHARS_PER_TOKEN,
        })
    }

    pub fn with_defaults() -> Self {
        // Defaults are always valid
        Self::new(&ChunkingConfig::default()).unwrap_or(Self {
            chunk_size: 3200,
            overlap: 400,
        })
    }

    /// Overlap target in characters.
    pub fn overlap_chars(&self) -> usize {
        self.overlap
    }

    /// Split text into chunks numbered contiguously from 0.
    ///
    /// Paragraphs are accumulated greedily; a paragraph that alone exceeds
    /// the budget is further split on sentence boundaries. Empty or
    /// whitespace-only input yields zero chunks.
    pub fn chunk(&self, source_id: &str, text: &str) -> Vec<Chunk> {
        if !has_meaningful_content(text) {
            return Vec::new();
        }

        let mut builder = ChunkBuilder::new(source_id);
        let mut current = String::new();

        for paragraph in RE_PARAGRAPH_BREAK.split(text) {
            if !has_meaningful_content(paragraph) {
                continue;
            }

            if joined_len(&current, paragraph) <= self.chunk_size {
                join_paragraph(&mut current, paragraph);
                continue;
            }

            if !current.is_empty() {
                builder.flush(std::mem::take(&mut current));
            }

            if paragraph.len() > self.chunk_size {
                current = self.split_sentences(paragraph, &mut builder);
            } else {
                current = paragraph.to_string();
            }
        }

        if !current.is_empty() {
            builder.flush(current);
        }

        builder.finish()
    }

    /// Greedily pack the sentences of an oversized paragraph, returning
    /// the unflushed tail as the next chunk seed.
    fn split_sentences(&self, paragraph: &str, builder: &mut ChunkBuilder<'_>) -> String {
        let mut current = String::new();

        for sentence in sentences_of(paragraph) {
            if current.len() + sentence.len() <= self.chunk_size {
                current.push_str(sentence);
            } else {
                if !current.is_empty() {
                    builder.flush(std::mem::take(&mut current));
                }
                current = sentence.to_string();
            }
        }

        current
    }
}

/// Sentence segments covering the whole paragraph.
///
/// Regex matches end-of-sentence punctuation; any unpunctuated tail is
/// kept as a final segment so no text is dropped. A paragraph without any
/// sentence boundary is one segment.
fn sentences_of(paragraph: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = Vec::new();
    let mut last_end = 0;

    for m in RE_SENTENCE.find_iter(paragraph) {
        segments.push(m.as_str());
        last_end = m.end();
    }

    if last_end < paragraph.len() {
        let tail = &paragraph[last_end..];
        if has_meaningful_content(tail) {
            segments.push(tail);
        }
    }

    if segments.is_empty() {
        segments.push(paragraph);
    }

    segments
}

fn joined_len(current: &str, paragraph: &str) -> usize {
    if current.is_empty() {
        paragraph.len()
    } else {
        current.len() + 2 + paragraph.len()
    }
}

fn join_paragraph(current: &mut String, paragraph: &str) {
    if !current.is_empty() {
        current.push_str("\n\n");
    }
    current.push_str(paragraph);
}

struct ChunkBuilder<'a> {
    source_id: &'a str,
    chunks: Vec<Chunk>,
}

impl<'a> ChunkBuilder<'a> {
    fn new(source_id: &'a str) -> Self {
        Self {
            source_id,
            chunks: Vec::new(),
        }
    }

    fn flush(&mut self, content: String) {
        let index = self.chunks.len() as u32;
        self.chunks.push(Chunk::new(self.source_id, index, content));
    }

    fn finish(self) -> Vec<Chunk> {
        self.chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(chunk_size: u32, chunk_overlap: u32) -> TextChunker {
        TextChunker::new(&ChunkingConfig {
            chunk_size,
            chunk_overlap,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        let chunker = TextChunker::with_defaults();
        assert!(chunker.chunk("s1", "").is_empty());
        assert!(chunker.chunk("s1", "   \n\n  \t ").is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunker = TextChunker::with_defaults();
        let chunks = chunker.chunk("s1", "Hello, world!");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Hello, world!");
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn test_two_paragraphs_two_chunks() {
        // Each paragraph fits the 400-char budget alone but not together
        let first = "a".repeat(350);
        let second = "b".repeat(350);
        let text = format!("{first}\n\n{second}");

        let chunks = chunker(100, 10).chunk("s1", &text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, first);
        assert_eq!(chunks[1].content, second);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn test_paragraphs_accumulate_greedily() {
        let text = "one\n\ntwo\n\nthree";
        let chunks = TextChunker::with_defaults().chunk("s1", text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "one\n\ntwo\n\nthree");
    }

    #[test]
    fn test_oversized_paragraph_splits_on_sentences() {
        let sentences: Vec<String> = (0..8)
            .map(|i| format!("Sentence number {i} filling out the paragraph with words. "))
            .collect();
        let paragraph = sentences.concat();
        assert!(paragraph.len() > 200);

        let chunks = chunker(50, 5).chunk("s1", &paragraph); // 200-char budget
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(has_meaningful_content(&chunk.content));
        }
        // No sentence text is lost
        let rejoined: String = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(rejoined.trim_end(), paragraph.trim_end());
    }

    #[test]
    fn test_unpunctuated_tail_is_kept() {
        let paragraph = format!("{}. And an unpunctuated tail", "x".repeat(450));
        let chunks = chunker(100, 10).chunk("s1", &paragraph);
        let rejoined: String = chunks.iter().map(|c| c.content.as_str()).collect();
        assert!(rejoined.contains("And an unpunctuated tail"));
    }

    #[test]
    fn test_indices_contiguous_and_counts_estimated() {
        let text = (0..30)
            .map(|i| format!("Paragraph {i} with a little bit of content in it."))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = chunker(25, 5).chunk("s1", &text);
        assert!(!chunks.is_empty());
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i as u32);
            assert_eq!(
                chunk.token_count,
                chunk.content.len().div_ceil(CHARS_PER_TOKEN) as u32
            );
            assert!(!chunk.content.is_empty());
        }
    }

    #[test]
    fn test_coverage_preserves_paragraph_order() {
        let paragraphs: Vec<String> = (0..12)
            .map(|i| format!("Unique paragraph marker {i} with filler text to add length."))
            .collect();
        let text = paragraphs.join("\n\n");
        let chunks = chunker(40, 5).chunk("s1", &text);

        let rejoined: String = chunks
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let positions: Vec<usize> = paragraphs
            .iter()
            .map(|p| rejoined.find(p.as_str()).expect("paragraph missing"))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let zero = ChunkingConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            TextChunker::new(&zero),
            Err(ChunkError::InvalidInput(_))
        ));

        let inverted = ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..Default::default()
        };
        assert!(matches!(
            TextChunker::new(&inverted),
            Err(ChunkError::InvalidInput(_))
        ));
    }
}
