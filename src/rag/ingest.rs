//! Document ingestion: text extraction, chunking, batched embedding.
//!
//! Every build produces a fresh [`RetrievalStore`]. Unreadable or empty
//! documents are skipped with a warning; embedding failures abort the build.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::error::IngestError;

use super::chunker::{ChunkConfig, TextChunk, chunk_document};
use super::embedder::Embedder;
use super::store::RetrievalStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Text,
}

/// A raw uploaded document.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub name: String,
    pub kind: DocumentKind,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    /// Detect PDFs by extension or `%PDF` magic; everything else is text.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let is_pdf = name.to_ascii_lowercase().ends_with(".pdf") || bytes.starts_with(b"%PDF");
        Self {
            name,
            kind: if is_pdf {
                DocumentKind::Pdf
            } else {
                DocumentKind::Text
            },
            bytes,
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self, IngestError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let bytes = tokio::fs::read(path).await.map_err(|e| IngestError::Read {
            source_name: name.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_bytes(name, bytes))
    }

    /// Extract plain text. PDF pages are joined by newlines.
    pub async fn extract_text(&self) -> Result<String, IngestError> {
        match self.kind {
            DocumentKind::Text => String::from_utf8(self.bytes.clone()).map_err(|e| {
                IngestError::Read {
                    source_name: self.name.clone(),
                    reason: format!("not valid UTF-8: {e}"),
                }
            }),
            DocumentKind::Pdf => {
                let bytes = self.bytes.clone();
                let extracted =
                    tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                        .await
                        .map_err(|e| IngestError::Read {
                            source_name: self.name.clone(),
                            reason: format!("PDF parser crashed: {e}"),
                        })?;
                let text = extracted.map_err(|e| IngestError::Read {
                    source_name: self.name.clone(),
                    reason: format!("PDF parsing failed: {e}"),
                })?;
                Ok(text.replace('\u{000C}', "\n"))
            }
        }
    }
}

/// A document left out of the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDocument {
    pub name: String,
    pub reason: String,
}

/// Summary of one build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Documents that contributed at least one chunk.
    pub documents: usize,
    pub chunks: usize,
    pub skipped: Vec<SkippedDocument>,
}

pub struct IngestionPipeline {
    embedder: Arc<dyn Embedder>,
    config: ChunkConfig,
}

impl IngestionPipeline {
    pub fn new(embedder: Arc<dyn Embedder>, config: ChunkConfig) -> Self {
        Self { embedder, config }
    }

    /// Read files from disk and build a store. Unreadable files are skipped.
    pub async fn build_from_paths<P: AsRef<Path>>(
        &self,
        paths: &[P],
    ) -> Result<(RetrievalStore, IngestReport), IngestError> {
        let mut documents = Vec::with_capacity(paths.len());
        let mut skipped = Vec::new();
        for path in paths {
            match SourceDocument::from_path(path.as_ref()).await {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    tracing::warn!(path = %path.as_ref().display(), "Skipping document: {}", e);
                    skipped.push(SkippedDocument {
                        name: path.as_ref().display().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let (store, mut report) = self.build(&documents).await?;
        skipped.extend(report.skipped);
        report.skipped = skipped;
        Ok((store, report))
    }

    /// Build a fresh store from in-memory documents.
    pub async fn build(
        &self,
        documents: &[SourceDocument],
    ) -> Result<(RetrievalStore, IngestReport), IngestError> {
        let mut report = IngestReport::default();
        let mut chunks: Vec<TextChunk> = Vec::new();

        for doc in documents {
            let text = match doc.extract_text().await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(document = %doc.name, "Skipping unreadable document: {}", e);
                    report.skipped.push(SkippedDocument {
                        name: doc.name.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            if text.trim().is_empty() {
                tracing::warn!(document = %doc.name, "Skipping document with no text");
                report.skipped.push(SkippedDocument {
                    name: doc.name.clone(),
                    reason: "no extractable text".to_string(),
                });
                continue;
            }

            let doc_chunks = chunk_document(&doc.name, &text, &self.config);
            tracing::debug!(document = %doc.name, chunks = doc_chunks.len(), "Chunked document");
            report.documents += 1;
            chunks.extend(doc_chunks);
        }

        let mut store = RetrievalStore::new();
        let batch_size = self.embedder.batch_size().max(1);
        let mut pending = chunks.into_iter().peekable();
        while pending.peek().is_some() {
            let batch: Vec<TextChunk> = pending.by_ref().take(batch_size).collect();
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            store.add(batch, vectors)?;
        }

        report.chunks = store.len();
        tracing::info!(
            documents = report.documents,
            chunks = report.chunks,
            skipped = report.skipped.len(),
            "Knowledge base built"
        );
        Ok((store, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::EmbeddingError;

    /// Deterministic embedder recording every batch size it sees.
    struct CountingEmbedder {
        batch_size: usize,
        batches: Mutex<Vec<usize>>,
    }

    impl CountingEmbedder {
        fn new(batch_size: usize) -> Self {
            Self {
                batch_size,
                batches: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.batches.lock().unwrap().push(inputs.len());
            Ok(inputs
                .iter()
                .map(|t| vec![t.len() as f32, t.split_whitespace().count() as f32, 1.0])
                .collect())
        }

        fn batch_size(&self) -> usize {
            self.batch_size
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::RequestFailed("503".into()))
        }

        fn batch_size(&self) -> usize {
            64
        }
    }

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    fn small_chunks() -> ChunkConfig {
        ChunkConfig {
            chunk_tokens: 10,
            overlap_tokens: 0,
        }
    }

    #[tokio::test]
    async fn two_documents_fill_one_store() {
        let embedder = Arc::new(CountingEmbedder::new(64));
        let pipeline = IngestionPipeline::new(embedder.clone(), small_chunks());
        let docs = vec![
            SourceDocument::from_bytes("rooms.txt", words(30).into_bytes()),
            SourceDocument::from_bytes("policies.txt", words(50).into_bytes()),
        ];

        let (store, report) = pipeline.build(&docs).await.unwrap();
        assert_eq!(store.len(), 8);
        assert_eq!(report.chunks, 8);
        assert_eq!(report.documents, 2);

        let hits = store.search(&[20.0, 10.0, 1.0], 4).unwrap();
        assert!(hits.len() <= 4);
        assert!(!hits.is_empty());
        for hit in &hits {
            assert!(store.chunks().contains(&hit.chunk));
        }
    }

    #[tokio::test]
    async fn embeds_in_bounded_batches() {
        let embedder = Arc::new(CountingEmbedder::new(3));
        let pipeline = IngestionPipeline::new(embedder.clone(), small_chunks());
        let docs = vec![SourceDocument::from_bytes("a.txt", words(70).into_bytes())];

        let (store, _) = pipeline.build(&docs).await.unwrap();
        assert_eq!(store.len(), 7);
        assert_eq!(*embedder.batches.lock().unwrap(), vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn empty_and_unreadable_documents_are_skipped() {
        let embedder = Arc::new(CountingEmbedder::new(64));
        let pipeline = IngestionPipeline::new(embedder, small_chunks());
        let docs = vec![
            SourceDocument::from_bytes("blank.txt", b"   \n ".to_vec()),
            SourceDocument::from_bytes("binary.txt", vec![0xff, 0xfe, 0x00]),
            SourceDocument::from_bytes("broken.pdf", b"%PDF-1.4 garbage".to_vec()),
            SourceDocument::from_bytes("ok.txt", words(5).into_bytes()),
        ];

        let (store, report) = pipeline.build(&docs).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(report.documents, 1);
        let skipped: Vec<_> = report.skipped.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(skipped, vec!["blank.txt", "binary.txt", "broken.pdf"]);
    }

    #[tokio::test]
    async fn embedding_failure_aborts_build() {
        let pipeline = IngestionPipeline::new(Arc::new(FailingEmbedder), small_chunks());
        let docs = vec![SourceDocument::from_bytes("a.txt", words(5).into_bytes())];
        let err = pipeline.build(&docs).await.unwrap_err();
        assert!(matches!(err, IngestError::Embedding(_)));
    }

    #[tokio::test]
    async fn build_from_paths_reads_files_and_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faq.txt");
        std::fs::write(&path, "Check-out is at 11am. Breakfast is served from 7am.").unwrap();
        let missing = dir.path().join("missing.txt");

        let pipeline =
            IngestionPipeline::new(Arc::new(CountingEmbedder::new(64)), ChunkConfig::default());
        let (store, report) = pipeline.build_from_paths(&[path, missing]).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.chunks()[0].source, "faq.txt");
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].name.ends_with("missing.txt"));
    }

    #[test]
    fn kind_detection() {
        assert_eq!(
            SourceDocument::from_bytes("Guide.PDF", Vec::new()).kind,
            DocumentKind::Pdf
        );
        assert_eq!(
            SourceDocument::from_bytes("upload", b"%PDF-1.7".to_vec()).kind,
            DocumentKind::Pdf
        );
        assert_eq!(
            SourceDocument::from_bytes("notes.md", b"hi".to_vec()).kind,
            DocumentKind::Text
        );
    }
}
