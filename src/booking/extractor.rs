//! LLM-backed booking field extraction.
//!
//! The model is asked for a JSON object with the six booking keys. Each key
//! becomes a typed `FieldUpdate`: absent, a candidate value, or the reset
//! sentinel. Candidates are raw strings; validation happens in the state
//! machine.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use crate::error::LlmError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

use super::record::BookingField;

/// Literal the model returns to ask for a field to be cleared.
pub const RESET_SENTINEL: &str = "RESET";

/// What the extractor found for one field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldUpdate {
    /// Not mentioned.
    #[default]
    Absent,
    /// A candidate value, not yet validated.
    Value(String),
    /// The user wants this field cleared.
    Reset,
}

impl FieldUpdate {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    fn from_json(value: Option<&Value>) -> Self {
        let text = match value {
            None | Some(Value::Null) => return Self::Absent,
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(_) => return Self::Absent,
        };
        if text.is_empty() || text.eq_ignore_ascii_case("null") {
            Self::Absent
        } else if text.eq_ignore_ascii_case(RESET_SENTINEL) {
            Self::Reset
        } else {
            Self::Value(text)
        }
    }
}

/// Typed extraction result for all six fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub customer_name: FieldUpdate,
    pub email: FieldUpdate,
    pub phone: FieldUpdate,
    pub booking_type: FieldUpdate,
    pub date: FieldUpdate,
    pub time: FieldUpdate,
}

impl ExtractedFields {
    pub fn get(&self, field: BookingField) -> &FieldUpdate {
        match field {
            BookingField::CustomerName => &self.customer_name,
            BookingField::Email => &self.email,
            BookingField::Phone => &self.phone,
            BookingField::BookingType => &self.booking_type,
            BookingField::Date => &self.date,
            BookingField::Time => &self.time,
        }
    }

    pub fn set(&mut self, field: BookingField, update: FieldUpdate) {
        match field {
            BookingField::CustomerName => self.customer_name = update,
            BookingField::Email => self.email = update,
            BookingField::Phone => self.phone = update,
            BookingField::BookingType => self.booking_type = update,
            BookingField::Date => self.date = update,
            BookingField::Time => self.time = update,
        }
    }

    pub fn is_empty(&self) -> bool {
        BookingField::ALL.iter().all(|f| self.get(*f).is_absent())
    }
}

/// Hints given to the extractor alongside the utterance.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionContext {
    /// The field currently being asked for.
    pub target: Option<BookingField>,
    pub today: NaiveDate,
    pub awaiting_confirmation: bool,
}

/// Turns a free-form utterance into candidate field values.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        utterance: &str,
        context: &ExtractionContext,
    ) -> Result<ExtractedFields, LlmError>;
}

/// Parse model output into typed fields.
///
/// Tolerates code fences and prose around the JSON object. Anything
/// unparseable yields an empty result.
pub fn parse_extraction(raw: &str) -> ExtractedFields {
    let Some(json) = strip_wrapping(raw) else {
        tracing::debug!(raw = %raw, "No JSON object in extraction output");
        return ExtractedFields::default();
    };
    let value: Value = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Failed to parse extraction JSON: {} (raw: {})", e, raw);
            return ExtractedFields::default();
        }
    };
    let Some(object) = value.as_object() else {
        return ExtractedFields::default();
    };

    let mut fields = ExtractedFields::default();
    for field in BookingField::ALL {
        fields.set(field, FieldUpdate::from_json(object.get(field.key())));
    }
    fields
}

/// Slice out the outermost `{...}` block.
fn strip_wrapping(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// System prompt for the extraction call.
pub fn extraction_prompt(context: &ExtractionContext) -> String {
    let target = match context.target {
        Some(field) => format!(
            "The assistant just asked the user for `{}`. A bare answer (e.g. just a name, \
             number or word) most likely fills that field.",
            field.key()
        ),
        None => "All fields are already collected; the user is reviewing the summary.".to_string(),
    };
    let correction = if context.awaiting_confirmation {
        "\nThe user is reviewing a booking summary. If they change a detail, return the new \
         value for that field."
    } else {
        ""
    };

    format!(
        "You extract hotel booking fields from user text.
Return ONLY a JSON object with keys: customer_name, email, phone, booking_type, date, time.
- Use date format YYYY-MM-DD and time HH:MM (24-hour). Today is {today}; resolve relative dates \
like \"tomorrow\" against it.
- booking_type is the room type the user wants (e.g. Standard, Deluxe, Suite).
- If a field is not mentioned, set it to null.
- If the user asks to clear, remove or change a field without giving the new value, set it to \"{reset}\".
- Copy values the user gave even if they look invalid; do not invent values.
{target}{correction}",
        today = context.today.format("%Y-%m-%d"),
        reset = RESET_SENTINEL,
    )
}

/// `Extractor` backed by an `LlmProvider`.
pub struct LlmExtractor {
    llm: Arc<dyn LlmProvider>,
}

impl LlmExtractor {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Extractor for LlmExtractor {
    async fn extract(
        &self,
        utterance: &str,
        context: &ExtractionContext,
    ) -> Result<ExtractedFields, LlmError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(extraction_prompt(context)),
            ChatMessage::user(utterance),
        ])
        .with_max_tokens(512)
        .with_temperature(0.0);

        let response = self.llm.complete(request).await?;
        let fields = parse_extraction(&response.content);
        tracing::debug!(
            model = self.llm.model_name(),
            empty = fields.is_empty(),
            "Extracted booking fields"
        );
        Ok(fields)
    }
}
