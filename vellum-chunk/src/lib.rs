pub mod text;

// Re-export the main chunking types for external use
pub use text::{DEFAULT_MAX_CHUNK_SIZE, TextChunk, TextSplitter};
