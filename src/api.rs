//! HTTP surface: chat, ingestion, booking listing and health.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};

use crate::agent::Assistant;
use crate::rag::SourceDocument;
use crate::store::BookingFilter;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct ApiState {
    pub assistant: Arc<Assistant>,
}

/// Build the Axum router.
pub fn api_routes(assistant: Arc<Assistant>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/ingest", post(ingest))
        .route("/api/bookings", get(list_bookings))
        .layer(cors)
        .with_state(ApiState { assistant })
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let indexed_chunks = state.assistant.router().knowledge().snapshot().len();
    Json(serde_json::json!({
        "status": "ok",
        "service": "hotel-assist",
        "indexed_chunks": indexed_chunks,
    }))
}

// ── Chat ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatRequest {
    session_id: String,
    message: String,
}

async fn chat(State(state): State<ApiState>, Json(body): Json<ChatRequest>) -> impl IntoResponse {
    if body.session_id.trim().is_empty() || body.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "session_id and message are required"})),
        );
    }

    // Keep HTTP sessions apart from CLI ones.
    let session_id = format!("http:{}", body.session_id.trim());
    let reply = state.assistant.chat(&session_id, &body.message).await;
    (StatusCode::OK, Json(serde_json::json!(reply)))
}

// ── Ingest ──────────────────────────────────────────────────────────────

/// A document uploaded inline. Server-side paths are never read.
#[derive(Debug, Deserialize)]
struct UploadedDocument {
    name: String,
    content_base64: String,
}

#[derive(Debug, Deserialize)]
struct IngestRequest {
    documents: Vec<UploadedDocument>,
}

async fn ingest(
    State(state): State<ApiState>,
    Json(body): Json<IngestRequest>,
) -> impl IntoResponse {
    if body.documents.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "documents must not be empty"})),
        );
    }

    let mut documents = Vec::with_capacity(body.documents.len());
    for upload in body.documents {
        match BASE64.decode(upload.content_base64.trim()) {
            Ok(bytes) => documents.push(SourceDocument::from_bytes(upload.name, bytes)),
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({
                        "error": format!("Invalid base64 content for {}: {}", upload.name, e)
                    })),
                );
            }
        }
    }

    match state.assistant.ingest_documents(&documents).await {
        Ok(report) => (StatusCode::OK, Json(serde_json::json!(report))),
        Err(e) => {
            tracing::error!("Ingestion via API failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({"error": e.to_string()})),
            )
        }
    }
}

// ── Bookings ────────────────────────────────────────────────────────────

async fn list_bookings(
    State(state): State<ApiState>,
    Query(filter): Query<BookingFilter>,
) -> impl IntoResponse {
    match state.assistant.list_bookings(&filter).await {
        Ok(bookings) => (StatusCode::OK, Json(serde_json::json!(bookings))),
        Err(e) => {
            tracing::error!("Listing bookings via API failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
        }
    }
}
