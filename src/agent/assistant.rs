//! The assistant: owns the dialogue router, ingestion and booking listing,
//! and drives a channel's message loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use crate::agent::submission::{HELP_TEXT, Submission, SubmissionParser};
use crate::channels::{Channel, IncomingMessage, OutgoingResponse};
use crate::dialogue::{DialogueRouter, RouterReply};
use crate::error::{DatabaseError, Error, IngestError};
use crate::rag::{IngestReport, IngestionPipeline, RetrievalStore, SourceDocument};
use crate::store::{BookingFilter, BookingListing, BookingRepository};

/// Idle sessions older than this are dropped by the pruning task.
pub const DEFAULT_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

const PRUNE_INTERVAL: Duration = Duration::from_secs(600);

pub struct Assistant {
    router: Arc<DialogueRouter>,
    ingestion: Arc<IngestionPipeline>,
    repository: Arc<dyn BookingRepository>,
    session_idle_timeout: Duration,
}

impl Assistant {
    pub fn new(
        router: Arc<DialogueRouter>,
        ingestion: Arc<IngestionPipeline>,
        repository: Arc<dyn BookingRepository>,
    ) -> Self {
        Self {
            router,
            ingestion,
            repository,
            session_idle_timeout: DEFAULT_SESSION_IDLE_TIMEOUT,
        }
    }

    pub fn with_session_idle_timeout(mut self, timeout: Duration) -> Self {
        self.session_idle_timeout = timeout;
        self
    }

    pub fn router(&self) -> &Arc<DialogueRouter> {
        &self.router
    }

    /// One conversational turn.
    pub async fn chat(&self, session_id: &str, message: &str) -> RouterReply {
        self.router.handle_turn(session_id, message).await
    }

    /// Rebuild the knowledge base from local files. Operator-only: the
    /// CLI and startup arguments call this, the HTTP surface does not.
    pub async fn ingest_paths(&self, paths: &[String]) -> Result<IngestReport, IngestError> {
        let paths: Vec<PathBuf> = paths.iter().map(PathBuf::from).collect();
        let (store, report) = self.ingestion.build_from_paths(&paths).await?;
        Ok(self.install(store, report))
    }

    /// Rebuild the knowledge base from uploaded documents.
    pub async fn ingest_documents(
        &self,
        documents: &[SourceDocument],
    ) -> Result<IngestReport, IngestError> {
        let (store, report) = self.ingestion.build(documents).await?;
        Ok(self.install(store, report))
    }

    /// Every successful build replaces the store, even an empty one. A
    /// failed build returns before this and leaves the old store serving.
    fn install(&self, store: RetrievalStore, report: IngestReport) -> IngestReport {
        if store.is_empty() {
            tracing::warn!("Ingestion produced no chunks; knowledge base is now empty");
        }
        self.router.knowledge().replace(store);
        report
    }

    pub async fn list_bookings(
        &self,
        filter: &BookingFilter,
    ) -> Result<Vec<BookingListing>, DatabaseError> {
        self.repository.list_bookings(filter).await
    }

    pub async fn reset(&self, session_id: &str) -> bool {
        self.router.sessions().reset(session_id).await
    }

    /// Run the message loop on `channel` until ctrl-c, `/quit` or end of input.
    pub async fn run(self: Arc<Self>, channel: Box<dyn Channel>) -> Result<(), Error> {
        let mut message_stream = channel.start().await?;

        let sessions = Arc::clone(self.router.sessions());
        let idle_timeout = self.session_idle_timeout;
        let pruning_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(PRUNE_INTERVAL);
            interval.tick().await; // Skip immediate first tick
            loop {
                interval.tick().await;
                sessions.prune_idle(idle_timeout).await;
            }
        });

        tracing::info!(channel = channel.name(), "Assistant ready and listening");

        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(m) => m,
                        None => {
                            tracing::info!("Channel stream ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            match self.handle_message(&message).await {
                Some(response) => {
                    if let Err(e) = channel.respond(&message, response).await {
                        tracing::error!("Failed to respond: {}", e);
                    }
                }
                None => {
                    tracing::info!("Shutdown command received, exiting...");
                    break;
                }
            }
        }

        pruning_handle.abort();
        channel.shutdown().await?;
        Ok(())
    }

    /// Handle one message. `None` means the user asked to quit.
    pub async fn handle_message(&self, message: &IncomingMessage) -> Option<OutgoingResponse> {
        let session_id = message.session_id();
        tracing::debug!(
            session = %session_id,
            chars = message.content.len(),
            "Received message"
        );

        let reply = match SubmissionParser::parse(&message.content) {
            Submission::UserInput { content } => {
                let turn = self.chat(&session_id, &content).await;
                let response =
                    OutgoingResponse::text(turn.reply).with_booking(turn.phase, turn.booking_id);
                return Some(response);
            }
            Submission::Ingest { paths } => self.handle_ingest(&paths).await,
            Submission::ListBookings { email } => {
                let filter = BookingFilter {
                    email,
                    ..Default::default()
                };
                self.handle_list(&filter).await
            }
            Submission::Reset => {
                self.reset(&session_id).await;
                "Conversation reset.".to_string()
            }
            Submission::Help => HELP_TEXT.to_string(),
            Submission::Quit => return None,
        };
        Some(OutgoingResponse::text(reply))
    }

    async fn handle_ingest(&self, paths: &[String]) -> String {
        if paths.is_empty() {
            return "Usage: /ingest <paths...>".to_string();
        }
        match self.ingest_paths(paths).await {
            Ok(report) => render_ingest_report(&report),
            Err(e) => {
                tracing::error!("Ingestion failed: {}", e);
                format!("Ingestion failed: {e}")
            }
        }
    }

    async fn handle_list(&self, filter: &BookingFilter) -> String {
        match self.list_bookings(filter).await {
            Ok(bookings) => render_bookings(&bookings),
            Err(e) => {
                tracing::error!("Listing bookings failed: {}", e);
                format!("Could not load bookings: {e}")
            }
        }
    }
}

fn render_ingest_report(report: &IngestReport) -> String {
    let mut out = format!(
        "Indexed {} chunks from {} document(s).",
        report.chunks, report.documents
    );
    for skipped in &report.skipped {
        out.push_str(&format!("\nSkipped {}: {}", skipped.name, skipped.reason));
    }
    out
}

fn render_bookings(bookings: &[BookingListing]) -> String {
    if bookings.is_empty() {
        return "No bookings found.".to_string();
    }
    bookings
        .iter()
        .map(|b| {
            format!(
                "#{} {} <{}> {} on {} at {} ({})",
                b.booking_id,
                b.name,
                b.email,
                b.booking_type,
                b.date.format("%Y-%m-%d"),
                b.time.format("%H:%M"),
                b.status
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use crate::booking::{
        BookingField, BookingStateMachine, ExtractedFields, ExtractionContext, Extractor,
        FieldUpdate, prompts,
    };
    use crate::dialogue::SessionManager;
    use crate::error::{EmbeddingError, LlmError};
    use crate::llm::ChatMessage;
    use crate::notify::{Notifier, NotifyOutcome};
    use crate::rag::{AnswerGenerator, ChunkConfig, Embedder, Generator, KnowledgeBase};
    use crate::store::LibSqlBackend;

    struct TargetExtractor;

    #[async_trait]
    impl Extractor for TargetExtractor {
        async fn extract(
            &self,
            utterance: &str,
            context: &ExtractionContext,
        ) -> Result<ExtractedFields, LlmError> {
            let mut fields = ExtractedFields::default();
            if let Some(target) = context.target {
                if !utterance.contains("book") {
                    fields.set(target, FieldUpdate::Value(utterance.to_string()));
                }
            }
            Ok(fields)
        }
    }

    struct UnitEmbedder;

    #[async_trait]
    impl Embedder for UnitEmbedder {
        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(inputs.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn batch_size(&self) -> usize {
            8
        }
    }

    struct OfflineEmbedder;

    #[async_trait]
    impl Embedder for OfflineEmbedder {
        async fn embed(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::RequestFailed("connection refused".into()))
        }

        fn batch_size(&self) -> usize {
            8
        }
    }

    struct FirstContextLine;

    #[async_trait]
    impl Generator for FirstContextLine {
        async fn generate(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError> {
            let prompt = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(prompt.lines().nth(1).unwrap_or_default().to_string())
        }
    }

    struct SilentNotifier;

    #[async_trait]
    impl Notifier for SilentNotifier {
        async fn send(&self, _to: &str, _subject: &str, _body: &str) -> NotifyOutcome {
            NotifyOutcome::sent()
        }
    }

    async fn assistant() -> Assistant {
        let repository = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let embedder: Arc<dyn Embedder> = Arc::new(UnitEmbedder);
        let machine = BookingStateMachine::new(
            Arc::new(TargetExtractor),
            repository.clone(),
            Arc::new(SilentNotifier),
        );
        let router = DialogueRouter::new(
            machine,
            AnswerGenerator::new(embedder.clone(), Arc::new(FirstContextLine)),
            Arc::new(KnowledgeBase::new()),
            Arc::new(SessionManager::default()),
        )
        .with_clock(|| NaiveDate::from_ymd_opt(2030, 6, 15).unwrap());
        let ingestion = IngestionPipeline::new(embedder, ChunkConfig::default());
        Assistant::new(Arc::new(router), Arc::new(ingestion), repository)
    }

    fn cli(content: &str) -> IncomingMessage {
        IncomingMessage::new("cli", "tester", content)
    }

    #[tokio::test]
    async fn commands_and_chat() {
        let assistant = assistant().await;

        let help = assistant.handle_message(&cli("/help")).await.unwrap().content;
        assert!(help.contains("/ingest"));

        let reply = assistant.handle_message(&cli("book a room")).await.unwrap().content;
        assert_eq!(reply, prompts::question_for(BookingField::CustomerName));

        assert_eq!(
            assistant.handle_message(&cli("/reset")).await.unwrap().content,
            "Conversation reset."
        );
        let handle = assistant.router().sessions().get_or_create("cli:tester").await;
        assert!(!handle.lock().await.booking.active);

        let status = assistant.handle_message(&cli("/help")).await.unwrap();
        assert!(status.phase.is_none());

        let turn = assistant.handle_message(&cli("book a room")).await.unwrap();
        assert_eq!(turn.phase, Some(crate::booking::BookingPhase::Collecting));

        assert!(assistant.handle_message(&cli("/quit")).await.is_none());
    }

    #[tokio::test]
    async fn ingest_then_answer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guide.txt");
        std::fs::write(&path, "Breakfast is served from 7 to 10.").unwrap();

        let assistant = assistant().await;
        let reply = assistant
            .handle_message(&cli(&format!("/ingest {}", path.display())))
            .await
            .unwrap().content;
        assert_eq!(reply, "Indexed 1 chunks from 1 document(s).");

        let answer = assistant
            .handle_message(&cli("what time is breakfast?"))
            .await
            .unwrap().content;
        assert_eq!(answer, "Breakfast is served from 7 to 10.");
    }

    #[tokio::test]
    async fn empty_rebuild_replaces_knowledge() {
        let dir = tempfile::tempdir().unwrap();
        let guide = dir.path().join("a.txt");
        let blank = dir.path().join("blank.txt");
        std::fs::write(&guide, "Pool opens at 9am.").unwrap();
        std::fs::write(&blank, "   \n").unwrap();

        let assistant = assistant().await;
        let reply = assistant.handle_message(&cli("/ingest")).await.unwrap().content;
        assert!(reply.starts_with("Usage"));

        assistant
            .ingest_paths(&[guide.display().to_string()])
            .await
            .unwrap();
        assert_eq!(assistant.router().knowledge().snapshot().len(), 1);

        let report = assistant
            .ingest_paths(&[
                blank.display().to_string(),
                "/definitely/missing.pdf".to_string(),
            ])
            .await
            .unwrap();
        assert_eq!(report.chunks, 0);
        assert_eq!(report.skipped.len(), 2);
        assert!(assistant.router().knowledge().snapshot().is_empty());

        let answer = assistant
            .handle_message(&cli("when does the pool open?"))
            .await
            .unwrap().content;
        assert_eq!(answer, crate::rag::answer::NOTHING_INDEXED);
    }

    #[tokio::test]
    async fn failed_build_keeps_previous_knowledge() {
        let assistant = assistant().await;
        let report = assistant
            .ingest_documents(&[SourceDocument::from_bytes(
                "guide.txt",
                b"Parking is free for guests.".to_vec(),
            )])
            .await
            .unwrap();
        assert_eq!(report.chunks, 1);

        let broken = Assistant::new(
            Arc::clone(assistant.router()),
            Arc::new(IngestionPipeline::new(
                Arc::new(OfflineEmbedder),
                ChunkConfig::default(),
            )),
            Arc::clone(&assistant.repository),
        );
        let err = broken
            .ingest_documents(&[SourceDocument::from_bytes(
                "other.txt",
                b"Checkout is at noon.".to_vec(),
            )])
            .await;
        assert!(err.is_err());
        assert_eq!(assistant.router().knowledge().snapshot().len(), 1);
    }

    #[tokio::test]
    async fn bookings_listing() {
        let assistant = assistant().await;
        assert_eq!(
            assistant.handle_message(&cli("/bookings")).await.unwrap().content,
            "No bookings found."
        );

        for turn in [
            "book a room",
            "Jane Doe",
            "jane@example.com",
            "5551234567",
            "Suite",
            "2030-07-01",
            "14:00",
            "confirm",
        ] {
            assistant.handle_message(&cli(turn)).await;
        }

        let listing = assistant
            .handle_message(&cli("/bookings jane@"))
            .await
            .unwrap().content;
        assert!(listing.contains("Jane Doe <jane@example.com> Suite on 2030-07-01 at 14:00 (confirmed)"));

        assert_eq!(
            assistant
                .handle_message(&cli("/bookings someone@else"))
                .await
                .unwrap().content,
            "No bookings found."
        );
    }
}
