//! Slot-filling booking state machine.
//!
//! One call to [`BookingStateMachine::handle`] processes one user turn
//! against a [`BookingRecord`]. The record is owned by the caller (the
//! session), so the machine itself is shared and stateless.

use std::sync::{Arc, LazyLock};

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;

use crate::notify::Notifier;
use crate::store::BookingRepository;

use super::extractor::{ExtractedFields, ExtractionContext, Extractor, FieldUpdate};
use super::prompts;
use super::record::{BookingField, BookingRecord};
use super::state::BookingPhase;
use super::validators;

static CONFIRM_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bconfirm\b").expect("valid confirm regex"));

static ROOM_OPTION_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(options?|available|which|what kind|types|choices)\b")
        .expect("valid room option regex")
});

/// Room categories offered when none are configured.
pub const DEFAULT_ROOM_TYPES: [&str; 4] = ["Standard", "Deluxe", "Suite", "Family"];

/// What one turn produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub reply: String,
    /// Phase after the turn. Terminal phases mean the record was reset.
    pub phase: BookingPhase,
    /// Set when the turn committed a booking.
    pub booking_id: Option<i64>,
}

impl TurnOutcome {
    fn new(reply: impl Into<String>, phase: BookingPhase) -> Self {
        Self {
            reply: reply.into(),
            phase,
            booking_id: None,
        }
    }
}

/// A validated value ready to be written into the record.
enum FieldValue {
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
}

pub struct BookingStateMachine {
    extractor: Arc<dyn Extractor>,
    repository: Arc<dyn BookingRepository>,
    notifier: Arc<dyn Notifier>,
    room_types: Vec<String>,
}

impl BookingStateMachine {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        repository: Arc<dyn BookingRepository>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            extractor,
            repository,
            notifier,
            room_types: DEFAULT_ROOM_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_room_types(mut self, room_types: Vec<String>) -> Self {
        if !room_types.is_empty() {
            self.room_types = room_types;
        }
        self
    }

    pub fn room_types(&self) -> &[String] {
        &self.room_types
    }

    /// Process one booking turn.
    ///
    /// "cancel" wins in every phase; "confirm" commits only while awaiting
    /// confirmation; everything else is a field update (or a correction).
    pub async fn handle(
        &self,
        record: &mut BookingRecord,
        utterance: &str,
        today: NaiveDate,
    ) -> TurnOutcome {
        let before = BookingPhase::of(record);
        let outcome = self.step(record, utterance, today).await;

        debug_assert!(
            before.can_transition_to(outcome.phase),
            "illegal booking transition {before} -> {}",
            outcome.phase
        );
        debug_assert!(
            !outcome.phase.is_terminal() || *record == BookingRecord::new(),
            "terminal phase {} left a live record",
            outcome.phase
        );
        if !before.can_transition_to(outcome.phase) {
            tracing::error!(from = %before, to = %outcome.phase, "Illegal booking transition");
        }
        outcome
    }

    async fn step(
        &self,
        record: &mut BookingRecord,
        utterance: &str,
        today: NaiveDate,
    ) -> TurnOutcome {
        let lower = utterance.trim().to_lowercase();

        if lower.contains("cancel") {
            tracing::info!("Booking cancelled by user");
            *record = BookingRecord::new();
            return TurnOutcome::new(prompts::CANCELLED, BookingPhase::Cancelled);
        }

        record.active = true;

        if record.awaiting_confirmation && record.is_complete() && is_confirmation(&lower) {
            return self.commit(record).await;
        }

        self.update(record, utterance, today).await
    }

    /// Extract, validate and apply fields from one utterance, then pick the reply.
    pub async fn update(
        &self,
        record: &mut BookingRecord,
        utterance: &str,
        today: NaiveDate,
    ) -> TurnOutcome {
        let target = record.first_missing();
        let correction = record.awaiting_confirmation;
        let context = ExtractionContext {
            target,
            today,
            awaiting_confirmation: correction,
        };

        let extracted = match self.extractor.extract(utterance, &context).await {
            Ok(fields) => fields,
            Err(e) => {
                tracing::warn!("Field extraction failed, treating as empty: {}", e);
                ExtractedFields::default()
            }
        };

        record.errors.clear();
        for field in BookingField::ALL {
            match extracted.get(field) {
                FieldUpdate::Absent => {}
                FieldUpdate::Reset => {
                    tracing::debug!(%field, "Field reset");
                    record.clear(field);
                }
                FieldUpdate::Value(raw) => match self.validate(field, raw, today) {
                    Ok(value) => {
                        if !record.is_set(field) || correction {
                            apply(record, field, value);
                        }
                    }
                    Err(message) => {
                        tracing::debug!(%field, "Field failed validation");
                        record.errors.insert(field, message);
                    }
                },
            }
        }

        if target == Some(BookingField::BookingType)
            && extracted.booking_type.is_absent()
            && ROOM_OPTION_WORDS.is_match(utterance)
        {
            record
                .errors
                .insert(BookingField::BookingType, prompts::room_options(&self.room_types));
        }

        if let Some(field @ (BookingField::Date | BookingField::Time)) = target {
            if !record.is_set(field) && !record.errors.contains(field) {
                let reminder = match field {
                    BookingField::Date => prompts::INVALID_DATE,
                    _ => prompts::INVALID_TIME,
                };
                record.errors.insert(field, reminder);
            }
        }

        if let Some(field) = target {
            record.errors.prioritize(field);
        }

        if let Some((_, message)) = record.errors.first() {
            let reply = message.to_string();
            if !record.is_complete() {
                record.awaiting_confirmation = false;
            }
            return TurnOutcome::new(reply, BookingPhase::of(record));
        }

        match record.first_missing() {
            Some(field) => {
                record.awaiting_confirmation = false;
                TurnOutcome::new(prompts::question_for(field), BookingPhase::Collecting)
            }
            None => {
                record.awaiting_confirmation = true;
                TurnOutcome::new(
                    prompts::confirmation_prompt(record),
                    BookingPhase::AwaitingConfirmation,
                )
            }
        }
    }

    async fn commit(&self, record: &mut BookingRecord) -> TurnOutcome {
        let Some(payload) = record.to_payload() else {
            *record = BookingRecord::new();
            return TurnOutcome::new(prompts::CANCELLED, BookingPhase::Cancelled);
        };

        let outcome = self.repository.persist_booking(&payload).await;
        let booking_id = match (outcome.success, outcome.booking_id) {
            (true, Some(id)) => id,
            _ => {
                let reason = outcome
                    .error
                    .unwrap_or_else(|| "unknown persistence error".to_string());
                tracing::error!("Booking persistence failed: {}", reason);
                *record = BookingRecord::new();
                return TurnOutcome::new(
                    prompts::booking_save_failed(&reason),
                    BookingPhase::Collecting,
                );
            }
        };

        let body = prompts::confirmation_email_body(booking_id, record);
        let notified = self
            .notifier
            .send(&payload.email, prompts::CONFIRMATION_SUBJECT, &body)
            .await;

        let reply = if notified.success {
            prompts::booking_confirmed(booking_id)
        } else {
            let reason = notified.error.unwrap_or_default();
            prompts::booking_confirmed_email_failed(booking_id, &reason)
        };

        tracing::info!(booking_id, "Booking committed");
        *record = BookingRecord::new();
        TurnOutcome {
            reply,
            phase: BookingPhase::Committed,
            booking_id: Some(booking_id),
        }
    }

    fn validate(&self, field: BookingField, raw: &str, today: NaiveDate) -> Result<FieldValue, String> {
        match field {
            BookingField::CustomerName => validators::validate_name(raw)
                .map(FieldValue::Text)
                .ok_or_else(|| prompts::INVALID_NAME.to_string()),
            BookingField::Email => {
                let email = raw.trim();
                if validators::validate_email(email) {
                    Ok(FieldValue::Text(email.to_string()))
                } else {
                    Err(prompts::INVALID_EMAIL.to_string())
                }
            }
            BookingField::Phone => match validators::normalize_phone(raw) {
                (digits, true) => Ok(FieldValue::Text(digits)),
                (_, false) => Err(prompts::invalid_phone()),
            },
            BookingField::BookingType => validators::validate_room_type(raw)
                .map(FieldValue::Text)
                .ok_or_else(|| prompts::INVALID_ROOM_TYPE.to_string()),
            BookingField::Date => match validators::parse_date(raw) {
                Some(date) if validators::validate_check_in(date, today) => Ok(FieldValue::Date(date)),
                Some(_) => Err(prompts::PAST_DATE.to_string()),
                None => Err(prompts::INVALID_DATE.to_string()),
            },
            BookingField::Time => validators::parse_time(raw)
                .map(FieldValue::Time)
                .ok_or_else(|| prompts::INVALID_TIME.to_string()),
        }
    }
}

fn apply(record: &mut BookingRecord, field: BookingField, value: FieldValue) {
    match (field, value) {
        (BookingField::CustomerName, FieldValue::Text(v)) => record.customer_name = Some(v),
        (BookingField::Email, FieldValue::Text(v)) => record.email = Some(v),
        (BookingField::Phone, FieldValue::Text(v)) => record.phone = Some(v),
        (BookingField::BookingType, FieldValue::Text(v)) => record.booking_type = Some(v),
        (BookingField::Date, FieldValue::Date(v)) => record.date = Some(v),
        (BookingField::Time, FieldValue::Time(v)) => record.time = Some(v),
        (field, _) => tracing::warn!(%field, "Validated value does not match field"),
    }
}

/// The word "confirm", or an exact "yes" / "yes, confirm".
fn is_confirmation(lower: &str) -> bool {
    CONFIRM_WORD.is_match(lower) || lower == "yes" || lower == "yes, confirm"
}
