//! Keyword intent classification.
//!
//! An ordered rule table: booking, then FAQ, then small talk. The first rule
//! with a keyword hit wins; no hit is `Unknown`. Keywords match whole words,
//! case-insensitively.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Booking,
    Faq,
    SmallTalk,
    Unknown,
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Booking => "booking",
            Self::Faq => "faq",
            Self::SmallTalk => "small_talk",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

const BOOKING_KEYWORDS: &[&str] = &[
    "book", "booking", "booked", "reserve", "reservation", "reserved", "room", "rooms", "suite",
    "stay", "check in", "check-in", "checkin", "night", "nights",
];

const FAQ_KEYWORDS: &[&str] = &[
    "price", "prices", "rate", "rates", "cost", "wifi", "wi-fi", "internet", "pool", "parking",
    "breakfast", "amenities", "check-out", "checkout", "pet", "pets", "policy", "refund",
    "cancellation", "details", "information", "tell me about", "do you have", "availability",
];

const SMALL_TALK_KEYWORDS: &[&str] = &[
    "hi", "hello", "hey", "good morning", "good afternoon", "good evening", "how are you",
    "what's up", "how is it going", "thanks", "thank you",
];

const QUESTION_WORDS: &[&str] = &[
    "what", "where", "when", "how", "why", "who", "which", "is", "are", "do", "does", "can",
    "could", "will", "would",
];

/// A compiled keyword rule.
#[derive(Debug, Clone)]
pub struct IntentRule {
    pub intent: Intent,
    pub regex: Regex,
}

impl IntentRule {
    /// Build a whole-word, case-insensitive alternation over `keywords`.
    pub fn from_keywords(intent: Intent, keywords: &[&str]) -> Result<Self, regex::Error> {
        let alternation = keywords
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        let regex = Regex::new(&format!(r"(?i)\b(?:{alternation})\b"))?;
        Ok(Self { intent, regex })
    }
}

pub struct IntentClassifier {
    rules: Vec<IntentRule>,
}

static DEFAULT_RULES: LazyLock<Vec<IntentRule>> = LazyLock::new(|| {
    [
        (Intent::Booking, BOOKING_KEYWORDS),
        (Intent::Faq, FAQ_KEYWORDS),
        (Intent::SmallTalk, SMALL_TALK_KEYWORDS),
    ]
    .into_iter()
    .map(|(intent, keywords)| {
        IntentRule::from_keywords(intent, keywords).expect("keyword regex compiles")
    })
    .collect()
});

static QUESTION_START: LazyLock<Regex> = LazyLock::new(|| {
    let words = QUESTION_WORDS.join("|");
    Regex::new(&format!(r"(?i)^\s*(?:{words})\b")).expect("question regex compiles")
});

impl Default for IntentClassifier {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.clone(),
        }
    }
}

impl IntentClassifier {
    pub fn new(rules: Vec<IntentRule>) -> Self {
        Self { rules }
    }

    pub fn classify(&self, utterance: &str) -> Intent {
        self.rules
            .iter()
            .find(|rule| rule.regex.is_match(utterance))
            .map(|rule| rule.intent)
            .unwrap_or(Intent::Unknown)
    }
}

/// Ends with `?` or starts with a question word.
pub fn is_question(utterance: &str) -> bool {
    utterance.trim_end().ends_with('?') || QUESTION_START.is_match(utterance)
}
