//! Retrieval-augmented answers over uploaded hotel documents.

pub mod answer;
pub mod chunker;
pub mod embedder;
pub mod ingest;
pub mod store;

pub use answer::{AnswerGenerator, Generator, LlmGenerator};
pub use chunker::{ChunkConfig, TextChunk, chunk_document, chunk_text};
pub use embedder::{Embedder, EmbedderConfig, OpenAiEmbedder};
pub use ingest::{IngestReport, IngestionPipeline, SkippedDocument, SourceDocument};
pub use store::{DocumentChunk, KnowledgeBase, RetrievalStore, ScoredChunk};
