//! Per-session conversation state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::booking::BookingRecord;

use super::history::{ConversationHistory, DEFAULT_HISTORY_CAP};

/// Everything one conversation owns.
#[derive(Debug)]
pub struct SessionContext {
    pub id: String,
    pub booking: BookingRecord,
    pub history: ConversationHistory,
    pub last_active: DateTime<Utc>,
}

impl SessionContext {
    pub fn new(id: impl Into<String>, history_cap: usize) -> Self {
        Self {
            id: id.into(),
            booking: BookingRecord::new(),
            history: ConversationHistory::new(history_cap),
            last_active: Utc::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }
}

pub type SessionHandle = Arc<Mutex<SessionContext>>;

/// Owns all sessions. Each session sits behind its own mutex so turns in one
/// session are serialized while different sessions run in parallel.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    history_cap: usize,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}

impl SessionManager {
    pub fn new(history_cap: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            history_cap,
        }
    }

    /// Fetch a session, creating it on first use.
    pub async fn get_or_create(&self, id: &str) -> SessionHandle {
        if let Some(handle) = self.sessions.read().await.get(id) {
            return Arc::clone(handle);
        }

        let mut sessions = self.sessions.write().await;
        let handle = sessions.entry(id.to_string()).or_insert_with(|| {
            tracing::debug!(session = id, "Session created");
            Arc::new(Mutex::new(SessionContext::new(id, self.history_cap)))
        });
        Arc::clone(handle)
    }

    /// Drop a session's booking and history. Returns false if it didn't exist.
    pub async fn reset(&self, id: &str) -> bool {
        let handle = self.sessions.read().await.get(id).cloned();
        match handle {
            Some(handle) => {
                let mut session = handle.lock().await;
                *session = SessionContext::new(id, self.history_cap);
                tracing::info!(session = id, "Session reset");
                true
            }
            None => false,
        }
    }

    /// Remove sessions idle for longer than `max_idle`. Returns how many were removed.
    pub async fn prune_idle(&self, max_idle: Duration) -> usize {
        let Ok(max_idle) = chrono::Duration::from_std(max_idle) else {
            return 0;
        };
        let cutoff = Utc::now() - max_idle;

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        let mut idle = Vec::new();
        for (id, handle) in sessions.iter() {
            // A handle held outside the map belongs to a turn in flight,
            // whether or not it has taken the lock yet.
            if Arc::strong_count(handle) > 1 {
                continue;
            }
            if let Ok(session) = handle.try_lock() {
                if session.last_active < cutoff {
                    idle.push(id.clone());
                }
            }
        }
        for id in &idle {
            sessions.remove(id);
        }
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::info!(removed, "Pruned idle sessions");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
