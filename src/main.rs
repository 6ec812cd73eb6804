use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use hotel_assist::agent::Assistant;
use hotel_assist::api::api_routes;
use hotel_assist::booking::{BookingStateMachine, LlmExtractor};
use hotel_assist::channels::CliChannel;
use hotel_assist::config::AppConfig;
use hotel_assist::dialogue::{DialogueRouter, SessionManager};
use hotel_assist::llm::create_provider;
use hotel_assist::notify::SmtpNotifier;
use hotel_assist::rag::{
    AnswerGenerator, Embedder, IngestionPipeline, KnowledgeBase, LlmGenerator, OpenAiEmbedder,
};
use hotel_assist::store::LibSqlBackend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let config = AppConfig::from_env().context("Invalid configuration")?;
    let _log_guard = init_tracing(config.log_dir.as_deref());

    eprintln!("🏨 Hotel Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   Embeddings: {}", config.rag.embedder.model);
    eprintln!(
        "   Chat API: http://{}:{}/api/chat",
        config.http_host, config.http_port
    );
    eprintln!("   Type a message and press Enter. /help for commands, /quit to exit.\n");

    let llm = create_provider(&config.llm)?;

    // ── Database ─────────────────────────────────────────────────────────
    let repository = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );
    eprintln!("   Database: {}", config.db_path.display());

    // ── Notifications ────────────────────────────────────────────────────
    let notifier = Arc::new(SmtpNotifier::new(config.smtp.clone()));
    eprintln!(
        "   Email confirmations: {}",
        if notifier.is_configured() { "enabled" } else { "disabled" }
    );

    // ── Booking + RAG ────────────────────────────────────────────────────
    let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(config.rag.embedder.clone())?);

    let machine = BookingStateMachine::new(
        Arc::new(LlmExtractor::new(llm.clone())),
        repository.clone(),
        notifier,
    )
    .with_room_types(config.room_types.clone());
    let answerer = AnswerGenerator::new(embedder.clone(), Arc::new(LlmGenerator::new(llm)))
        .with_top_k(config.rag.top_k);

    let router = DialogueRouter::new(
        machine,
        answerer,
        Arc::new(KnowledgeBase::new()),
        Arc::new(SessionManager::new(config.history_cap)),
    );
    let ingestion = IngestionPipeline::new(embedder, config.rag.chunk);

    let assistant = Arc::new(
        Assistant::new(Arc::new(router), Arc::new(ingestion), repository)
            .with_session_idle_timeout(config.session_idle_timeout),
    );

    // Documents named on the command line are indexed before the first turn.
    let startup_docs: Vec<String> = std::env::args().skip(1).collect();
    if !startup_docs.is_empty() {
        match assistant.ingest_paths(&startup_docs).await {
            Ok(report) => eprintln!(
                "   Indexed {} chunks from {} document(s)",
                report.chunks, report.documents
            ),
            Err(e) => eprintln!("   Warning: startup ingestion failed: {}", e),
        }
    }

    // ── HTTP ─────────────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind((config.http_host, config.http_port))
        .await
        .with_context(|| {
            format!("Failed to bind {}:{}", config.http_host, config.http_port)
        })?;
    let app = api_routes(Arc::clone(&assistant));
    tokio::spawn(async move {
        tracing::info!("HTTP server started");
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("HTTP server stopped: {}", e);
        }
    });

    assistant.run(Box::new(CliChannel::new())).await?;
    Ok(())
}

/// Console logging plus daily rolling files when `log_dir` is set. The
/// returned guard flushes the file writer on drop.
fn init_tracing(log_dir: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "hotel-assist.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .init();
    guard
}
