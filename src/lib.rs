//! Hotel Assist: conversational room booking and document-grounded hotel FAQ.

pub mod agent;
pub mod api;
pub mod booking;
pub mod channels;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod llm;
pub mod notify;
pub mod rag;
pub mod store;
