//! Sentence-aware text chunking

use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;

/// Text chunker with configurable size and overlap
pub struct TextChunker {
    /// Target chunk size in characters
    chunk_size: usize,
    /// Overlap between chunks
    overlap: usize,
    /// Minimum chunk size
    min_size: usize,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
            min_size: 50,
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
            min_size: config.min_chunk_size,
        }
    }

    /// Split text into overlapping chunks on sentence boundaries
    ///
    /// Fragments shorter than the minimum size are dropped, except that a
    /// short but non-empty text still yields one chunk.
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current_chunk = String::new();

        for sentence in text.split_sentence_bounds() {
            // If adding this sentence exceeds chunk size, save current chunk
            if !current_chunk.is_empty() && current_chunk.len() + sentence.len() > self.chunk_size {
                if current_chunk.trim().len() >= self.min_size {
                    chunks.push(current_chunk.trim().to_string());
                }

                // Start new chunk with overlap
                current_chunk = self.overlap_text(&current_chunk);
            }

            current_chunk.push_str(sentence);
        }

        let tail = current_chunk.trim();
        if tail.len() >= self.min_size || (chunks.is_empty() && !tail.is_empty()) {
            chunks.push(tail.to_string());
        }

        chunks
    }

    /// Get overlap text from the end of a chunk
    fn overlap_text(&self, text: &str) -> String {
        let text = text.trim_end();
        if self.overlap == 0 || text.is_empty() {
            return String::new();
        }
        if text.len() <= self.overlap {
            return format!("{} ", text);
        }

        let mut start = text.len().saturating_sub(self.overlap);

        // Ensure we're at a valid UTF-8 character boundary
        while start > 0 && !text.is_char_boundary(start) {
            start -= 1;
        }

        let overlap_text = &text[start..];

        // Try to start at a sentence boundary, then fall back to a word boundary
        let carried = if let Some(pos) = overlap_text.find(". ") {
            &overlap_text[pos + 2..]
        } else if let Some(pos) = overlap_text.find(' ') {
            &overlap_text[pos + 1..]
        } else {
            overlap_text
        };

        format!("{} ", carried)
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}
