//! Turn routing: classify, apply session overrides, dispatch, record history.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::booking::{BookingPhase, BookingRecord, BookingStateMachine};
use crate::llm::Role;
use crate::rag::{AnswerGenerator, KnowledgeBase};

use super::intent::{Intent, IntentClassifier, is_question};
use super::session::SessionManager;

pub const GREETING: &str =
    "Hello! I can help you book rooms or answer questions about the hotel.";
pub const CLARIFICATION: &str = "I'm not sure I understood. Are you trying to make a hotel \
     booking or asking about hotel details?";

type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// The assistant's answer to one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouterReply {
    pub reply: String,
    pub intent: Intent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<BookingPhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<i64>,
}

impl RouterReply {
    fn plain(reply: impl Into<String>, intent: Intent) -> Self {
        Self {
            reply: reply.into(),
            intent,
            phase: None,
            booking_id: None,
        }
    }
}

pub struct DialogueRouter {
    classifier: IntentClassifier,
    booking: BookingStateMachine,
    answerer: AnswerGenerator,
    knowledge: Arc<KnowledgeBase>,
    sessions: Arc<SessionManager>,
    today: Clock,
}

impl DialogueRouter {
    pub fn new(
        booking: BookingStateMachine,
        answerer: AnswerGenerator,
        knowledge: Arc<KnowledgeBase>,
        sessions: Arc<SessionManager>,
    ) -> Self {
        Self {
            classifier: IntentClassifier::default(),
            booking,
            answerer,
            knowledge,
            sessions,
            today: Arc::new(|| chrono::Local::now().date_naive()),
        }
    }

    /// Replace the date source (tests pin "today").
    pub fn with_clock(mut self, today: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.today = Arc::new(today);
        self
    }

    pub fn with_classifier(mut self, classifier: IntentClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    /// Base intent plus the overrides that keep an active booking on track.
    pub fn route(&self, record: &BookingRecord, utterance: &str) -> Intent {
        let base = self.classifier.classify(utterance);

        if record.active && utterance.to_lowercase().contains("cancel") {
            return Intent::Booking;
        }
        if record.awaiting_confirmation {
            return if base == Intent::Faq && is_question(utterance) {
                Intent::Faq
            } else {
                Intent::Booking
            };
        }
        if record.active {
            return match base {
                Intent::Faq if is_question(utterance) => Intent::Faq,
                _ => Intent::Booking,
            };
        }
        base
    }

    /// Process one user utterance for `session_id`.
    pub async fn handle_turn(&self, session_id: &str, utterance: &str) -> RouterReply {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return RouterReply::plain(CLARIFICATION, Intent::Unknown);
        }

        let handle = self.sessions.get_or_create(session_id).await;
        let mut session = handle.lock().await;
        session.touch();

        let intent = self.route(&session.booking, utterance);
        tracing::debug!(session = session_id, %intent, "Routed turn");

        let reply = match intent {
            Intent::Booking => {
                let today = (self.today)();
                let outcome = self
                    .booking
                    .handle(&mut session.booking, utterance, today)
                    .await;
                RouterReply {
                    reply: outcome.reply,
                    intent,
                    phase: Some(outcome.phase),
                    booking_id: outcome.booking_id,
                }
            }
            Intent::Faq => {
                let store = self.knowledge.snapshot();
                let answer = self
                    .answerer
                    .answer(&store, utterance, session.history.messages())
                    .await;
                RouterReply::plain(answer, intent)
            }
            Intent::SmallTalk => RouterReply::plain(GREETING, intent),
            Intent::Unknown => RouterReply::plain(CLARIFICATION, intent),
        };

        session.history.push(Role::User, utterance);
        session.history.push(Role::Assistant, reply.reply.clone());
        reply
    }
}
