//! Token-bounded overlapping chunking.
//!
//! Tokens are whitespace-separated words. Windows of `chunk_tokens` advance
//! by `chunk_tokens - overlap_tokens` while the window start is inside the
//! token stream, so the final chunk may be shorter than the rest.

/// Default tokens per chunk.
pub const DEFAULT_CHUNK_TOKENS: usize = 500;
/// Default tokens shared between adjacent chunks.
pub const DEFAULT_OVERLAP_TOKENS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    pub chunk_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_tokens: DEFAULT_CHUNK_TOKENS,
            overlap_tokens: DEFAULT_OVERLAP_TOKENS,
        }
    }
}

impl ChunkConfig {
    /// Tokens the window moves per step. Never zero.
    pub fn step(&self) -> usize {
        self.chunk_tokens.saturating_sub(self.overlap_tokens).max(1)
    }
}

/// A chunk of one document, before embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub source: String,
    /// Position within the source document.
    pub index: usize,
    pub text: String,
}

/// Rough token estimate (word count).
pub fn estimate_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split `text` into overlapping windows of whitespace tokens.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<String> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let size = config.chunk_tokens.max(1);
    let step = config.step();

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < tokens.len() {
        let end = (start + size).min(tokens.len());
        chunks.push(tokens[start..end].join(" "));
        start += step;
    }
    chunks
}

/// Chunk one document, tagging each chunk with its source and sequence index.
pub fn chunk_document(source: &str, text: &str, config: &ChunkConfig) -> Vec<TextChunk> {
    chunk_text(text, config)
        .into_iter()
        .enumerate()
        .map(|(index, text)| TextChunk {
            source: source.to_string(),
            index,
            text,
        })
        .collect()
}
