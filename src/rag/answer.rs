//! Grounded answers from the retrieval store.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

use super::embedder::Embedder;
use super::store::RetrievalStore;

/// Chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 4;

/// Prior turns forwarded to the generator with each question.
const HISTORY_TURNS: usize = 6;

pub const NOTHING_INDEXED: &str = "No hotel documents indexed yet. Ingest documents with \
     /ingest (or POST /api/ingest), then ask your question again.";
pub const NOTHING_FOUND: &str =
    "I couldn't find any information about that in the uploaded documents.";
pub const ANSWER_FAILED: &str =
    "Sorry, I couldn't look that up right now. Please try again in a moment.";

pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

const SYSTEM_PROMPT: &str = "You are a helpful hotel booking assistant. Use the provided context \
     to answer the user's question accurately. If the answer is not in the context, say you \
     don't know.";

/// Produces text from a prepared conversation.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError>;
}

/// `Generator` backed by an `LlmProvider`.
pub struct LlmGenerator {
    llm: Arc<dyn LlmProvider>,
    temperature: f32,
}

impl LlmGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            temperature: 0.7,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn generate(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError> {
        let request = CompletionRequest::new(messages)
            .with_max_tokens(1024)
            .with_temperature(self.temperature);
        let response = self.llm.complete(request).await?;
        Ok(response.content)
    }
}

pub struct AnswerGenerator {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    top_k: usize,
}

impl AnswerGenerator {
    pub fn new(embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>) -> Self {
        Self {
            embedder,
            generator,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Answer `question` from `store`. Never fails; problems become fixed text.
    pub async fn answer(
        &self,
        store: &RetrievalStore,
        question: &str,
        history: &[ChatMessage],
    ) -> String {
        if store.is_empty() {
            return NOTHING_INDEXED.to_string();
        }

        let query = match self.embedder.embed(&[question.to_string()]).await {
            Ok(mut vectors) if vectors.len() == 1 => vectors.remove(0),
            Ok(vectors) => {
                tracing::error!(count = vectors.len(), "Query embedding returned wrong count");
                return ANSWER_FAILED.to_string();
            }
            Err(e) => {
                tracing::error!("Query embedding failed: {}", e);
                return ANSWER_FAILED.to_string();
            }
        };

        let hits = match store.search(&query, self.top_k) {
            Ok(hits) => hits,
            Err(e) => {
                tracing::error!("Retrieval failed: {}", e);
                return ANSWER_FAILED.to_string();
            }
        };
        if hits.is_empty() {
            return NOTHING_FOUND.to_string();
        }

        let context = hits
            .iter()
            .map(|hit| hit.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);
        tracing::debug!(chunks = hits.len(), "Retrieved context");

        let mut messages = Vec::with_capacity(HISTORY_TURNS + 2);
        messages.push(ChatMessage::system(SYSTEM_PROMPT));
        let skip = history.len().saturating_sub(HISTORY_TURNS);
        messages.extend(history.iter().skip(skip).cloned());
        messages.push(ChatMessage::user(format!(
            "Context:\n{context}\n\nQuestion: {question}"
        )));

        match self.generator.generate(messages).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Answer generation failed: {}", e);
                ANSWER_FAILED.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::EmbeddingError;
    use crate::llm::Role;
    use crate::rag::chunker::TextChunk;

    struct UnitEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for UnitEmbedder {
        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(inputs.iter().map(|_| vec![0.0, 0.0]).collect())
        }

        fn batch_size(&self) -> usize {
            64
        }
    }

    #[derive(Default)]
    struct EchoGenerator {
        seen: Mutex<Vec<Vec<ChatMessage>>>,
        fail: bool,
    }

    #[async_trait]
    impl Generator for EchoGenerator {
        async fn generate(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError> {
            self.seen.lock().unwrap().push(messages);
            if self.fail {
                return Err(LlmError::RequestFailed {
                    provider: "stub".into(),
                    reason: "boom".into(),
                });
            }
            Ok("The wifi password is on your key card.".into())
        }
    }

    fn store_with(n: usize) -> RetrievalStore {
        let mut store = RetrievalStore::new();
        let chunks = (0..n)
            .map(|i| TextChunk {
                source: "guide.txt".into(),
                index: i,
                text: format!("chunk {i}"),
            })
            .collect();
        let vectors = (0..n).map(|i| vec![i as f32, 0.0]).collect();
        store.add(chunks, vectors).unwrap();
        store
    }

    fn setup(fail: bool) -> (AnswerGenerator, Arc<UnitEmbedder>, Arc<EchoGenerator>) {
        let embedder = Arc::new(UnitEmbedder {
            calls: AtomicUsize::new(0),
        });
        let generator = Arc::new(EchoGenerator {
            fail,
            ..Default::default()
        });
        (
            AnswerGenerator::new(embedder.clone(), generator.clone()),
            embedder,
            generator,
        )
    }

    #[tokio::test]
    async fn empty_store_makes_no_calls() {
        let (answerer, embedder, generator) = setup(false);
        let reply = answerer
            .answer(&RetrievalStore::new(), "what is the wifi password", &[])
            .await;
        assert_eq!(reply, NOTHING_INDEXED);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert!(generator.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn prompt_contains_top_four_chunks() {
        let (answerer, _, generator) = setup(false);
        let history = vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant("Hello!"),
        ];
        let reply = answerer
            .answer(&store_with(6), "what is the wifi password", &history)
            .await;
        assert_eq!(reply, "The wifi password is on your key card.");

        let seen = generator.seen.lock().unwrap();
        let messages = &seen[0];
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("say you don't know"));
        assert_eq!(messages.len(), 4);

        let prompt = &messages.last().unwrap().content;
        assert!(prompt.starts_with("Context:\nchunk 0\n\n---\n\nchunk 1"));
        assert!(prompt.contains("chunk 3"));
        assert!(!prompt.contains("chunk 4"));
        assert!(prompt.ends_with("Question: what is the wifi password"));
    }

    #[tokio::test]
    async fn generation_failure_becomes_apology() {
        let (answerer, _, _) = setup(true);
        let reply = answerer.answer(&store_with(2), "parking?", &[]).await;
        assert_eq!(reply, ANSWER_FAILED);
    }

    #[tokio::test]
    async fn dimension_mismatch_becomes_apology() {
        let (answerer, _, generator) = setup(false);
        let mut store = RetrievalStore::new();
        store
            .add(
                vec![TextChunk {
                    source: "a".into(),
                    index: 0,
                    text: "x".into(),
                }],
                vec![vec![1.0, 2.0, 3.0]],
            )
            .unwrap();
        let reply = answerer.answer(&store, "pool hours?", &[]).await;
        assert_eq!(reply, ANSWER_FAILED);
        assert!(generator.seen.lock().unwrap().is_empty());
    }
}
