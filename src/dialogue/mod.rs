//! Conversation handling: intent classification, per-session state and
//! the router that ties booking and FAQ answering together.

pub mod history;
pub mod intent;
pub mod router;
pub mod session;

pub use history::{ConversationHistory, DEFAULT_HISTORY_CAP};
pub use intent::{Intent, IntentClassifier, IntentRule, is_question};
pub use router::{CLARIFICATION, DialogueRouter, GREETING, RouterReply};
pub use session::{SessionContext, SessionHandle, SessionManager};
