//! Sentence-aware text splitting for retrieval pipelines.
//!
//! Documents are split into bounded-size chunks that become the unit of
//! embedding and retrieval in a RAG (Retrieval Augmented Generation) system.
//! Splitting is sentence-first: the text is segmented on sentence terminators
//! (`.`, `!`, `?`), and whole sentences are packed into each chunk until the
//! size limit would be exceeded. A sentence that is longer than the limit on
//! its own is packed word by word instead, so a chunk boundary never lands in
//! the middle of a word.
//!
//! The module defines two main structs:
//! - [`TextSplitter`]: Holds the splitting configuration (compiled sentence
//!   boundary pattern plus maximum chunk size) and performs the split.
//! - [`TextChunk`]: One chunk of the source text together with its position.
//!
//! A [`TextSplitter`] is a pure function of its input: it carries no mutable
//! state, so one instance can be shared freely across documents and calls.
//!
//! # Usage
//!
//! ```
//! use vellum_chunk::text::TextSplitter;
//!
//! let splitter = TextSplitter::new(40);
//! let chunks =
//!     splitter.split("Short sentence. Another short sentence. And a third one follows here.");
//!
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[0].text, "Short sentence. Another short sentence");
//! assert_eq!(chunks[1].text, "And a third one follows here");
//! assert_eq!(chunks[1].sequence, 1);
//! assert!(chunks.iter().all(|c| c.text.len() <= 40));
//! ```
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default maximum chunk size in bytes, chosen to keep a handful of chunks
/// comfortably inside a generation prompt.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 500;

/// Separator reinserted between sentences that are packed into one chunk.
const SENTENCE_JOIN: &str = ". ";

/// One bounded-size segment of a source text.
///
/// `sequence` is dense and zero-based: it equals the chunk's position in the
/// vector returned by [`TextSplitter::split`], which in turn follows the
/// order of the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// The position of this chunk within the source text (0-indexed).
    pub sequence: usize,
    /// The text content of this specific chunk.
    pub text: String,
}

/// Splits raw text into bounded-size, word-safe chunks.
///
/// The splitter segments its input on runs of sentence terminators and packs
/// whole sentences into chunks of at most `max_chunk_size` bytes, joining
/// them with `". "`. An individual sentence that exceeds the limit is packed
/// word by word under the same limit; a single word longer than the limit is
/// emitted as its own (oversized) chunk rather than being cut apart.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    boundary: Regex,
    max_chunk_size: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK_SIZE)
    }
}

impl TextSplitter {
    /// Creates a `TextSplitter` with the given maximum chunk size in bytes.
    ///
    /// # Arguments
    ///
    /// *   `max_chunk_size` - Upper bound for the byte length of each chunk.
    ///     Only a single word longer than this bound may ever exceed it.
    ///
    /// # Examples
    ///
    /// ```
    /// use vellum_chunk::text::TextSplitter;
    ///
    /// let splitter = TextSplitter::new(700);
    /// let chunks = splitter.split("One modest sentence.");
    /// assert_eq!(chunks.len(), 1);
    /// assert_eq!(chunks[0].text, "One modest sentence");
    /// ```
    pub fn new(max_chunk_size: usize) -> Self {
        TextSplitter {
            // A run of terminators ("?!", "...") counts as one boundary.
            boundary: Regex::new(r"[.!?]+").unwrap(),
            max_chunk_size,
        }
    }

    /// The configured maximum chunk size in bytes.
    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Splits `text` into ordered, bounded-size chunks.
    ///
    /// Sentences are accumulated into a buffer that is flushed as a chunk
    /// whenever appending the next sentence would exceed the size limit; a
    /// non-empty trailing buffer is flushed as the final chunk. Empty or
    /// whitespace-only input yields an empty vector.
    ///
    /// # Arguments
    ///
    /// *   `text` - The full source text to split.
    ///
    /// # Returns
    ///
    /// A `Vec<TextChunk>` in source-text order with dense, zero-based
    /// `sequence` numbers.
    ///
    /// # Examples
    ///
    /// ```
    /// use vellum_chunk::text::TextSplitter;
    ///
    /// let splitter = TextSplitter::new(500);
    /// assert!(splitter.split("   \n\t  ").is_empty());
    ///
    /// let chunks = splitter.split("Just one sentence here.");
    /// assert_eq!(chunks.len(), 1);
    /// assert_eq!(chunks[0].sequence, 0);
    /// ```
    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        let mut chunks: Vec<TextChunk> = Vec::new();
        let mut buffer = String::new();

        for segment in self.boundary.split(text) {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }

            if segment.len() > self.max_chunk_size {
                // Sentence alone is over the limit: emit what we have, then
                // pack this sentence word by word.
                flush(&mut chunks, &mut buffer);
                self.split_words(segment, &mut chunks);
            } else if buffer.is_empty() {
                buffer.push_str(segment);
            } else if buffer.len() + SENTENCE_JOIN.len() + segment.len() > self.max_chunk_size {
                flush(&mut chunks, &mut buffer);
                buffer.push_str(segment);
            } else {
                buffer.push_str(SENTENCE_JOIN);
                buffer.push_str(segment);
            }
        }

        flush(&mut chunks, &mut buffer);
        chunks
    }

    // Word-level packing for a single sentence that exceeds the chunk size.
    // Words are joined with single spaces; a lone word over the limit is
    // force-emitted unbroken.
    fn split_words(&self, segment: &str, chunks: &mut Vec<TextChunk>) {
        let mut buffer = String::new();

        for word in segment.split_whitespace() {
            if word.len() > self.max_chunk_size {
                flush(chunks, &mut buffer);
                chunks.push(TextChunk {
                    sequence: chunks.len(),
                    text: word.to_string(),
                });
            } else if buffer.is_empty() {
                buffer.push_str(word);
            } else if buffer.len() + 1 + word.len() > self.max_chunk_size {
                flush(chunks, &mut buffer);
                buffer.push_str(word);
            } else {
                buffer.push(' ');
                buffer.push_str(word);
            }
        }

        flush(chunks, &mut buffer);
    }
}

fn flush(chunks: &mut Vec<TextChunk>, buffer: &mut String) {
    if !buffer.is_empty() {
        chunks.push(TextChunk {
            sequence: chunks.len(),
            text: std::mem::take(buffer),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Strip terminators and whitespace so reconstructed text can be compared
    /// against the source regardless of where chunk boundaries landed.
    fn content_only(text: &str) -> String {
        text.chars()
            .filter(|c| !c.is_whitespace() && !matches!(c, '.' | '!' | '?'))
            .collect()
    }

    #[test]
    fn test_split_empty_input() {
        let splitter = TextSplitter::new(500);
        assert!(splitter.split("").is_empty());
        assert!(splitter.split("   \n\t  ").is_empty());
        assert!(splitter.split("...!!??").is_empty());
    }

    #[test]
    fn test_split_single_sentence() {
        let splitter = TextSplitter::new(500);
        let chunks = splitter.split("The quick brown fox jumps over the lazy dog.");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].sequence, 0);
        assert_eq!(chunks[0].text, "The quick brown fox jumps over the lazy dog");
    }

    #[test]
    fn test_split_packs_sentences_until_limit() {
        let splitter = TextSplitter::new(10);
        let chunks = splitter.split("aaaa. bbbb. cccc.");

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["aaaa. bbbb", "cccc"]);
    }

    #[test]
    fn test_split_mixed_terminators() {
        let splitter = TextSplitter::new(60);
        let chunks = splitter.split("Is it done? Yes! Ship it... now.");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Is it done. Yes. Ship it. now");
    }

    #[test]
    fn test_split_oversized_sentence_falls_back_to_words() {
        let splitter = TextSplitter::new(10);
        let chunks = splitter.split("one two three four");

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["one two", "three four"]);
        assert!(chunks.iter().all(|c| c.text.len() <= 10));
    }

    #[test]
    fn test_split_force_emits_oversized_word() {
        let splitter = TextSplitter::new(5);
        let chunks = splitter.split("a pneumonoultramicroscopic b");

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "pneumonoultramicroscopic", "b"]);
    }

    #[test]
    fn test_split_flushes_buffer_before_word_fallback() {
        let splitter = TextSplitter::new(12);
        let chunks = splitter.split("short. a sentence much too long for one chunk. tail.");

        // The buffered "short" must come out intact before the long sentence
        // is packed word by word, and "tail" must land after it.
        assert_eq!(chunks[0].text, "short");
        assert_eq!(chunks.last().unwrap().text, "tail");
        for chunk in &chunks {
            assert!(chunk.text.len() <= 12, "oversized chunk: {:?}", chunk.text);
        }
    }

    #[test]
    fn test_split_single_400_char_sentence_with_700_limit() {
        let splitter = TextSplitter::new(700);
        let sentence = "word ".repeat(79) + "tail.";
        assert_eq!(sentence.len(), 400);

        let chunks = splitter.split(&sentence);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.len() <= 700);
    }

    #[test]
    fn test_split_sequences_are_dense() {
        let splitter = TextSplitter::new(25);
        let text = "First sentence here. Second sentence here. Third one. \
                    Averyveryverylongwordthatneedsitsownchunk and more words after it. Done.";
        let chunks = splitter.split(text);

        assert!(chunks.len() > 2);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.sequence, i);
        }
    }

    #[test]
    fn test_split_preserves_all_content() {
        let splitter = TextSplitter::new(30);
        let text = "The refund policy lasts 30 days! After that? No refunds. \
                    Exceptions require written approval from the finance team.";
        let chunks = splitter.split(text);

        let reconstructed: String = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(SENTENCE_JOIN);
        assert_eq!(content_only(&reconstructed), content_only(text));
    }

    #[test]
    fn test_split_respects_limit_on_long_text() {
        let splitter = TextSplitter::new(500);
        let text = "This is a test sentence. ".repeat(100);
        let chunks = splitter.split(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.len() <= 500);
        }
        let reconstructed: String = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(SENTENCE_JOIN);
        assert_eq!(content_only(&reconstructed), content_only(&text));
    }

    #[test]
    fn test_split_is_pure_across_calls() {
        let splitter = TextSplitter::new(40);
        let first_text = "State from one call. Must never leak. Into another.";
        let second_text = "A completely unrelated document.";

        let first = splitter.split(first_text);
        let _ = splitter.split(second_text);
        let again = splitter.split(first_text);

        assert_eq!(first, again);
    }
}
