//! Booking slot-filling: validators, the partial record, LLM field
//! extraction and the per-turn state machine.

pub mod extractor;
pub mod machine;
pub mod prompts;
pub mod record;
pub mod state;
pub mod validators;

pub use extractor::{
    ExtractedFields, ExtractionContext, Extractor, FieldUpdate, LlmExtractor, parse_extraction,
};
pub use machine::{BookingStateMachine, DEFAULT_ROOM_TYPES, TurnOutcome};
pub use record::{BookingField, BookingPayload, BookingRecord, FieldErrors};
pub use state::BookingPhase;
