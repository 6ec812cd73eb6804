//! Submission types: slash commands versus conversational input.

use serde::{Deserialize, Serialize};

/// Parses user input into Submission types.
pub struct SubmissionParser;

impl SubmissionParser {
    /// Parse message content into a Submission.
    pub fn parse(content: &str) -> Submission {
        let trimmed = content.trim();
        let lower = trimmed.to_lowercase();

        match lower.as_str() {
            "/help" | "/?" => Submission::Help,
            "/reset" | "/new" => Submission::Reset,
            "/quit" | "/exit" => Submission::Quit,
            _ => parse_parameterized(content, trimmed, &lower),
        }
    }
}

/// `/ingest <paths...>`, `/bookings [email]`, or plain user input.
fn parse_parameterized(content: &str, trimmed: &str, lower: &str) -> Submission {
    parse_ingest(trimmed, lower)
        .or_else(|| parse_bookings(trimmed, lower))
        .unwrap_or_else(|| Submission::UserInput {
            content: content.to_string(),
        })
}

fn parse_ingest(trimmed: &str, lower: &str) -> Option<Submission> {
    if lower != "/ingest" && !lower.starts_with("/ingest ") {
        return None;
    }
    let paths = trimmed
        .split_whitespace()
        .skip(1)
        .map(|s| s.to_string())
        .collect();
    Some(Submission::Ingest { paths })
}

fn parse_bookings(trimmed: &str, lower: &str) -> Option<Submission> {
    if lower != "/bookings" && !lower.starts_with("/bookings ") {
        return None;
    }
    let email = trimmed.split_whitespace().nth(1).map(|s| s.to_string());
    Some(Submission::ListBookings { email })
}

/// A submission to the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Submission {
    /// Conversational text, routed through the dialogue router.
    UserInput { content: String },

    /// Rebuild the knowledge base from these files.
    Ingest { paths: Vec<String> },

    /// Show stored bookings, optionally filtered by email substring.
    ListBookings { email: Option<String> },

    /// Drop this session's booking and history.
    Reset,

    Help,

    Quit,
}

pub const HELP_TEXT: &str = "\
Commands:
  /ingest <paths...>   index hotel documents (PDF or text)
  /bookings [email]    list stored bookings
  /reset               start over
  /help                show this help
  /quit                exit
Anything else is sent to the assistant.";
