//! In-memory retrieval store: append-only chunks plus a flat L2 index.

use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::error::RetrievalError;

use super::chunker::TextChunk;

/// An embedded chunk. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentChunk {
    pub source: String,
    pub index: usize,
    pub text: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

/// A search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub distance: f32,
}

/// Exact nearest-neighbour index over row-major vectors.
#[derive(Debug, Default)]
struct FlatL2Index {
    dimension: Option<usize>,
    vectors: Vec<f32>,
    count: usize,
}

impl FlatL2Index {
    fn check_dimension(&self, actual: usize) -> Result<(), RetrievalError> {
        match self.dimension {
            Some(expected) if expected != actual => {
                Err(RetrievalError::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }

    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<(), RetrievalError> {
        let Some(first) = vectors.first() else {
            return Ok(());
        };
        let dimension = self.dimension.unwrap_or(first.len());
        if dimension == 0 {
            return Err(RetrievalError::DimensionMismatch {
                expected: 1,
                actual: 0,
            });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(RetrievalError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }

        self.dimension = Some(dimension);
        for vector in vectors {
            self.vectors.extend_from_slice(vector);
        }
        self.count += vectors.len();
        Ok(())
    }

    /// Row ids of the `k` nearest vectors with their distances, closest first.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, RetrievalError> {
        let Some(dimension) = self.dimension else {
            return Ok(Vec::new());
        };
        self.check_dimension(query.len())?;

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(dimension)
            .map(|row| euclidean_distance(row, query))
            .enumerate()
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// Chunks and their vectors. Insertion is the only mutation; the index
/// always holds exactly one vector per chunk.
#[derive(Debug, Default)]
pub struct RetrievalStore {
    chunks: Vec<DocumentChunk>,
    index: FlatL2Index,
}

impl RetrievalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append chunks with their embeddings. An empty batch is a no-op.
    pub fn add(
        &mut self,
        chunks: Vec<TextChunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<(), RetrievalError> {
        if chunks.len() != vectors.len() {
            return Err(RetrievalError::LengthMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }
        if chunks.is_empty() {
            return Ok(());
        }

        self.index.add(&vectors)?;
        self.chunks
            .extend(chunks.into_iter().zip(vectors).map(|(chunk, embedding)| {
                DocumentChunk {
                    source: chunk.source,
                    index: chunk.index,
                    text: chunk.text,
                    embedding,
                }
            }));
        debug_assert_eq!(self.chunks.len(), self.index.count);
        Ok(())
    }

    /// Up to `k` nearest chunks by Euclidean distance. Empty on an empty store.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, RetrievalError> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let hits = self.index.search(query, k)?;
        Ok(hits
            .into_iter()
            .filter_map(|(row, distance)| {
                self.chunks.get(row).map(|chunk| ScoredChunk {
                    chunk: chunk.clone(),
                    distance,
                })
            })
            .collect())
    }

    /// Number of indexed vectors.
    pub fn len(&self) -> usize {
        self.index.count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> Option<usize> {
        self.index.dimension
    }

    pub fn chunks(&self) -> &[DocumentChunk] {
        &self.chunks
    }
}

/// Shared slot holding the current store.
///
/// Readers take a snapshot `Arc`; ingestion swaps in a whole new store.
/// Queries already running keep the snapshot they started with.
#[derive(Debug, Default)]
pub struct KnowledgeBase {
    current: RwLock<Arc<RetrievalStore>>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<RetrievalStore> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn replace(&self, store: RetrievalStore) {
        let store = Arc::new(store);
        match self.current.write() {
            Ok(mut guard) => *guard = store,
            Err(poisoned) => *poisoned.into_inner() = store,
        }
    }
}
