//! Fixed user-facing text for the booking flow.

use chrono::{NaiveDate, NaiveTime, Timelike};

use super::record::{BookingField, BookingRecord};
use super::validators::{MAX_PHONE_DIGITS, MIN_PHONE_DIGITS, parse_date, parse_time};

/// Email subject for confirmations.
pub const CONFIRMATION_SUBJECT: &str = "Hotel Booking Confirmation";

pub const INVALID_NAME: &str = "Please tell me the guest name.";
pub const INVALID_EMAIL: &str = "Invalid email address.";
pub const INVALID_DATE: &str = "Please use date format YYYY-MM-DD.";
pub const PAST_DATE: &str = "The check-in date can't be in the past. Please use YYYY-MM-DD.";
pub const INVALID_TIME: &str = "Please use time format HH:MM (24h).";
pub const INVALID_ROOM_TYPE: &str = "Please tell me which type of room you'd like.";

pub const CANCELLED: &str = "Booking cancelled. Let me know if you'd like to start again.";

/// The question asked when `field` is the first missing slot.
pub fn question_for(field: BookingField) -> &'static str {
    match field {
        BookingField::CustomerName => "May I know the guest name?",
        BookingField::Email => "What's your email address for confirmation?",
        BookingField::Phone => "What's your phone number?",
        BookingField::BookingType => "What type of room would you like to book?",
        BookingField::Date => "What check-in date? Please use YYYY-MM-DD.",
        BookingField::Time => "What arrival time? Please use HH:MM (24-hour).",
    }
}

pub fn invalid_phone() -> String {
    format!(
        "Please provide a phone number with {MIN_PHONE_DIGITS} to {MAX_PHONE_DIGITS} digits."
    )
}

/// Informational reply for "which rooms do you have?" style questions.
pub fn room_options(room_types: &[String]) -> String {
    format!(
        "We offer the following room types: {}. Which one would you like?",
        room_types.join(", ")
    )
}

/// Format a time as `HH:MM`, keeping seconds only when they are set.
pub fn format_time(time: NaiveTime) -> String {
    if time.second() == 0 {
        time.format("%H:%M").to_string()
    } else {
        time.format("%H:%M:%S").to_string()
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Bullet summary of the record, in field order.
pub fn render_summary(record: &BookingRecord) -> String {
    let or_unset = |v: Option<String>| v.unwrap_or_else(|| "N/A".to_string());
    let lines = [
        (BookingField::CustomerName, or_unset(record.customer_name.clone())),
        (BookingField::Email, or_unset(record.email.clone())),
        (BookingField::Phone, or_unset(record.phone.clone())),
        (BookingField::BookingType, or_unset(record.booking_type.clone())),
        (BookingField::Date, or_unset(record.date.map(format_date))),
        (BookingField::Time, or_unset(record.time.map(format_time))),
    ];
    lines
        .iter()
        .map(|(field, value)| format!("- {}: {}", field.label(), value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Read a summary produced by `render_summary` back into a record.
///
/// Lines that don't match a known label are ignored, as are "N/A" values.
pub fn parse_summary(summary: &str) -> BookingRecord {
    let mut record = BookingRecord::new();
    for line in summary.lines() {
        let Some(rest) = line.trim().strip_prefix("- ") else {
            continue;
        };
        let Some((label, value)) = rest.split_once(": ") else {
            continue;
        };
        let value = value.trim();
        if value == "N/A" {
            continue;
        }
        let Some(field) = BookingField::ALL.into_iter().find(|f| f.label() == label) else {
            continue;
        };
        match field {
            BookingField::CustomerName => record.customer_name = Some(value.to_string()),
            BookingField::Email => record.email = Some(value.to_string()),
            BookingField::Phone => record.phone = Some(value.to_string()),
            BookingField::BookingType => record.booking_type = Some(value.to_string()),
            BookingField::Date => record.date = parse_date(value),
            BookingField::Time => record.time = parse_time(value),
        }
    }
    record
}

/// Summary plus the instruction to confirm or cancel.
pub fn confirmation_prompt(record: &BookingRecord) -> String {
    format!(
        "Please review your booking:\n\n{}\n\nType 'confirm' to finalize or 'cancel' to discard. \
         You can also tell me what to change.",
        render_summary(record)
    )
}

pub fn booking_confirmed(booking_id: i64) -> String {
    format!("Booking confirmed! ID: {booking_id}. A confirmation email has been sent.")
}

pub fn booking_confirmed_email_failed(booking_id: i64, reason: &str) -> String {
    format!("Booking confirmed (ID {booking_id}) but email failed: {reason}")
}

pub fn booking_save_failed(reason: &str) -> String {
    format!("Error saving booking: {reason}")
}

pub fn confirmation_email_body(booking_id: i64, record: &BookingRecord) -> String {
    format!(
        "Your hotel booking is confirmed.\n\nBooking ID: {booking_id}\n\n{}",
        render_summary(record)
    )
}
